//! Vehicle directory repository for the `vehicles` table.

use rusqlite::{Connection, OptionalExtension, params};
use sanchar_core::VehicleProfile;

use crate::errors::Result;

/// Vehicle repository.
pub struct VehicleRepo;

impl VehicleRepo {
    /// Insert or replace a vehicle.
    pub fn upsert(conn: &Connection, vehicle: &VehicleProfile) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO vehicles (vehicle_id, display_number) VALUES (?1, ?2)
             ON CONFLICT(vehicle_id) DO UPDATE SET display_number = excluded.display_number",
            params![vehicle.vehicle_id, vehicle.display_number],
        )?;
        Ok(())
    }

    /// Look up a vehicle.
    pub fn get(conn: &Connection, vehicle_id: &str) -> Result<Option<VehicleProfile>> {
        let row = conn
            .query_row(
                "SELECT vehicle_id, display_number FROM vehicles WHERE vehicle_id = ?1",
                params![vehicle_id],
                |row| {
                    Ok(VehicleProfile {
                        vehicle_id: row.get(0)?,
                        display_number: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
