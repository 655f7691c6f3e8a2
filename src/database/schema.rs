//! Table layout shared by every backend. The Postgres DDL in `migrations/`
//! mirrors these definitions; the memory backend enforces the unique indexes itself.

#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    /// Each entry is one unique index over the listed columns
    pub unique: &'static [&'static [&'static str]],
}

pub const TENANTS: TableDef = TableDef { name: "tenants", unique: &[&["slug"]] };
pub const DOMAINS: TableDef = TableDef { name: "domains", unique: &[&["domain"]] };

// Login email and employee number are unique per tenant, not globally
pub const USERS: TableDef = TableDef {
    name: "users",
    unique: &[&["tenant_id", "email"], &["tenant_id", "employee_id"]],
};
pub const DEPARTMENTS: TableDef = TableDef { name: "departments", unique: &[] };
pub const COMPANY_PROFILES: TableDef = TableDef { name: "company_profiles", unique: &[&["tenant_id"]] };

pub const CENTRAL_TABLES: &[TableDef] = &[TENANTS, DOMAINS];
pub const TENANT_TABLES: &[TableDef] = &[USERS, DEPARTMENTS, COMPANY_PROFILES];

/// Tables hosted by the central database: registry tables plus shared-mode tenant tables
pub fn central_tables() -> Vec<TableDef> {
    CENTRAL_TABLES.iter().chain(TENANT_TABLES.iter()).copied().collect()
}

/// Tables hosted by a dedicated tenant database
pub fn dedicated_tables() -> Vec<TableDef> {
    TENANT_TABLES.to_vec()
}

pub const CENTRAL_MIGRATIONS: &str = include_str!("../../migrations/central.sql");
pub const TENANT_MIGRATIONS: &str = include_str!("../../migrations/tenant.sql");
