use vhub_sql::SQLStore;

use crate::service::MarketError;

/// Initialize the SQLite schema for all marketplace records.
///
/// The CHECK constraints restate the model invariants so that no write
/// path, however it is reached, can store a verified student or an
/// over-full opportunity.
pub fn init_schema(sql: &dyn SQLStore) -> Result<(), MarketError> {
    let statements = [
        // Accounts: students and organizations
        "CREATE TABLE IF NOT EXISTS accounts (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE COLLATE NOCASE,
            password_hash TEXT NOT NULL,
            kind TEXT NOT NULL CHECK (kind IN ('student', 'organization')),
            verified INTEGER NOT NULL DEFAULT 0,
            display_name TEXT NOT NULL,
            phone TEXT,
            address TEXT,
            city TEXT,
            website TEXT,
            bio TEXT,
            service_hours_goal INTEGER,
            total_hours_logged INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (kind = 'organization' OR verified = 0),
            CHECK (kind = 'student' OR (service_hours_goal IS NULL AND total_hours_logged IS NULL)),
            CHECK (total_hours_logged IS NULL OR total_hours_logged >= 0)
        )",
        "CREATE INDEX IF NOT EXISTS idx_accounts_kind ON accounts(kind)",

        // Opportunities: posted by organizations
        "CREATE TABLE IF NOT EXISTS opportunities (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            hours_needed INTEGER NOT NULL CHECK (hours_needed > 0),
            max_volunteers INTEGER NOT NULL CHECK (max_volunteers > 0),
            current_volunteers INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL CHECK (status IN ('active', 'inactive', 'completed')),
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            location TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            zip_code TEXT NOT NULL,
            requirements TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (current_volunteers >= 0 AND current_volunteers <= max_volunteers),
            FOREIGN KEY (organization_id) REFERENCES accounts(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_opportunities_org ON opportunities(organization_id)",
        "CREATE INDEX IF NOT EXISTS idx_opportunities_status ON opportunities(status)",
        "CREATE INDEX IF NOT EXISTS idx_opportunities_category ON opportunities(category)",
        "CREATE INDEX IF NOT EXISTS idx_opportunities_date ON opportunities(date, time)",

        // Registrations: one per (student, opportunity)
        "CREATE TABLE IF NOT EXISTS registrations (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            opportunity_id TEXT NOT NULL,
            registered_at TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('registered', 'completed', 'cancelled')),
            hours_completed INTEGER NOT NULL DEFAULT 0 CHECK (hours_completed >= 0),
            UNIQUE (user_id, opportunity_id),
            FOREIGN KEY (user_id) REFERENCES accounts(id),
            FOREIGN KEY (opportunity_id) REFERENCES opportunities(id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_registrations_opportunity ON registrations(opportunity_id)",

        // Saved bookmarks: one per (student, opportunity)
        "CREATE TABLE IF NOT EXISTS bookmarks (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            opportunity_id TEXT NOT NULL,
            saved_at TEXT NOT NULL,
            UNIQUE (user_id, opportunity_id),
            FOREIGN KEY (user_id) REFERENCES accounts(id),
            FOREIGN KEY (opportunity_id) REFERENCES opportunities(id)
        )",
    ];

    for stmt in &statements {
        sql.exec(stmt, &[])?;
    }

    Ok(())
}
