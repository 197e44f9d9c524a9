use crate::Db;
use crate::error::Result;

const MIGRATION_0001: &str = include_str!("../migrations/0001_facts.sql");
const MIGRATION_0002: &str = include_str!("../migrations/0002_rollups.sql");

const MIGRATIONS: &[(&str, &str)] = &[
    ("0001_facts", MIGRATION_0001),
    ("0002_rollups", MIGRATION_0002),
];

impl Db {
    pub fn migrate(&mut self) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (name, sql) in MIGRATIONS {
            tx.execute_batch(sql)?;
            tracing::debug!(migration = *name, "applied migration");
        }
        tx.commit()?;
        Ok(())
    }
}
