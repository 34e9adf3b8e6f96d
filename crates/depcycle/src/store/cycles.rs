//! `known_cycles` rows.

use rusqlite::{Transaction, params};

use super::{Store, format_timestamp, parse_timestamp};
use crate::cycles::KnownCycle;
use crate::error::{Error, Result};
use crate::types::AnalysisLevel;

impl Store {
    /// Every known cycle, ordered by level and id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded.
    pub fn load_known_cycles(&self) -> Result<Vec<KnownCycle>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare(
            "SELECT level, id, members, discovered_at FROM known_cycles ORDER BY level, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut cycles = Vec::new();
        for row in rows {
            let (level, id, members, discovered_at) = row?;
            let level = AnalysisLevel::parse(&level).ok_or_else(|| {
                Error::Internal(format!("unknown analysis level '{level}' in cache database"))
            })?;
            cycles.push(KnownCycle {
                id,
                level,
                members: serde_json::from_str(&members)?,
                discovered_at: parse_timestamp(&discovered_at)?,
            });
        }
        Ok(cycles)
    }
}

/// Replace the known cycles of `levels` with `cycles`. Rows of other levels
/// are left alone.
pub(super) fn write_known_cycles(
    tx: &Transaction<'_>,
    levels: &[AnalysisLevel],
    cycles: &[KnownCycle],
) -> Result<()> {
    for level in levels {
        tx.execute("DELETE FROM known_cycles WHERE level = ?1", [level.as_str()])?;
    }
    for cycle in cycles.iter().filter(|c| levels.contains(&c.level)) {
        tx.execute(
            "INSERT OR REPLACE INTO known_cycles (level, id, members, discovered_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                cycle.level.as_str(),
                cycle.id,
                serde_json::to_string(&cycle.members)?,
                format_timestamp(cycle.discovered_at),
            ],
        )?;
    }
    Ok(())
}
