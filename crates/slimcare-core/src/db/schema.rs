//! SQLite schema definition.

/// Complete database schema for SlimCare.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    local_id TEXT PRIMARY KEY,
    full_name TEXT NOT NULL,
    birth_date TEXT,
    height_cm REAL NOT NULL,
    initial_weight_kg REAL NOT NULL,
    desired_weight_kg REAL,
    first_dose_date TEXT NOT NULL,
    default_dose_mg REAL,
    points INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
    treatment_status TEXT NOT NULL DEFAULT 'active'
        CHECK (treatment_status IN ('active', 'completed', 'abandoned', 'non-payment')),
    termination_date TEXT,
    termination_reason TEXT,
    phone TEXT,
    notes TEXT,
    version INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    -- Termination fields are set iff the treatment is not active
    CHECK ((treatment_status = 'active') = (termination_date IS NULL)),
    CHECK ((termination_date IS NULL) = (termination_reason IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(full_name);
CREATE INDEX IF NOT EXISTS idx_patients_status ON patients(treatment_status);

-- Authenticated users that map to a patient get portal access
CREATE TABLE IF NOT EXISTS portal_links (
    user_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(local_id) ON DELETE CASCADE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Doses
-- ============================================================================

CREATE TABLE IF NOT EXISTS doses (
    dose_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(local_id) ON DELETE CASCADE,
    dose_number INTEGER NOT NULL CHECK (dose_number >= 1),
    date TEXT NOT NULL,
    time TEXT,
    status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'administered')),
    administered_mg REAL,
    weight_kg REAL,
    bmi REAL,
    administered_at TEXT,
    UNIQUE (patient_id, dose_number)
);

CREATE INDEX IF NOT EXISTS idx_doses_patient ON doses(patient_id);
CREATE INDEX IF NOT EXISTS idx_doses_status_date ON doses(status, date);

-- ============================================================================
-- Evolutions (bioimpedance snapshots)
-- ============================================================================

CREATE TABLE IF NOT EXISTS evolutions (
    evolution_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(local_id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    metrics TEXT NOT NULL DEFAULT '{}',          -- JSON object of Bioimpedance
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_evolutions_patient ON evolutions(patient_id, date);

-- ============================================================================
-- Inventory
-- ============================================================================

CREATE TABLE IF NOT EXISTS vials (
    vial_id TEXT PRIMARY KEY,
    purchase_date TEXT NOT NULL,
    total_mg INTEGER NOT NULL CHECK (total_mg IN (40, 60, 90)),
    cost REAL NOT NULL,
    sold_mg REAL NOT NULL DEFAULT 0 CHECK (sold_mg >= 0 AND sold_mg <= total_mg),
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- Cash flow (sales are income entries with sale columns set)
-- ============================================================================

CREATE TABLE IF NOT EXISTS cash_flow (
    entry_id TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK (kind IN ('entrada', 'saida')),
    description TEXT NOT NULL,
    amount REAL NOT NULL CHECK (amount >= 0),
    date TEXT NOT NULL,
    due_date TEXT,
    paid_at TEXT,
    payment_method TEXT,
    is_sale INTEGER NOT NULL DEFAULT 0,
    sale_patient_id TEXT REFERENCES patients(local_id) ON DELETE SET NULL,
    sale_vial_id TEXT REFERENCES vials(vial_id),
    sale_mg REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_cash_flow_date ON cash_flow(date);
CREATE INDEX IF NOT EXISTS idx_cash_flow_patient ON cash_flow(sale_patient_id);

-- ============================================================================
-- Settings
-- ============================================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,                          -- JSON
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;
