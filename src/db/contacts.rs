use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, params_from_iter, Row};

use super::Database;
use crate::error::{Error, Result};
use crate::models::{Contact, ContactId, LinkPrecedence, NewContact};
use crate::store::ContactStore;

const CONTACT_COLUMNS: &str =
    "id, email, phone_number, linked_id, link_precedence, created_at, updated_at, deleted_at";

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn id_placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Database {
    // ==================== CONTACT CREATE ====================

    /// Inserts a row as given. The store assigns the id.
    pub fn insert_contact(&self, new: &NewContact) -> Result<Contact> {
        let created_at = format_timestamp(&new.created_at);
        self.conn.execute(
            r#"INSERT INTO contacts (
                email, phone_number, linked_id, link_precedence, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)"#,
            params![
                new.email,
                new.phone_number,
                new.linked_id,
                new.link_precedence.as_str(),
                created_at,
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        self.get_contact(id)?
            .ok_or_else(|| Error::internal(format!("contact {id} vanished after insert")))
    }

    // ==================== CONTACT READ ====================

    /// Live contact by id.
    pub fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ? AND deleted_at IS NULL"
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let result = stmt.query_row([id], Self::row_to_contact);

        match result {
            Ok(contact) => Ok(Some(contact)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn count_contacts(&self) -> Result<u32> {
        let count: u32 = self.conn.query_row(
            "SELECT COUNT(*) FROM contacts WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn query_contacts(&self, sql: &str, values: &[&dyn rusqlite::ToSql]) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(sql)?;
        let contacts = stmt
            .query_map(values, Self::row_to_contact)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contacts)
    }

    fn row_to_contact(row: &Row) -> rusqlite::Result<Contact> {
        let precedence: String = row.get(4)?;
        let link_precedence = LinkPrecedence::parse(&precedence).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                rusqlite::types::Type::Text,
                format!("unknown link precedence: {precedence}").into(),
            )
        })?;

        Ok(Contact {
            id: row.get(0)?,
            email: row.get(1)?,
            phone_number: row.get(2)?,
            linked_id: row.get(3)?,
            link_precedence,
            created_at: parse_timestamp(5, &row.get::<_, String>(5)?)?,
            updated_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
            deleted_at: row
                .get::<_, Option<String>>(7)?
                .map(|s| parse_timestamp(7, &s))
                .transpose()?,
        })
    }

    // ==================== CONTACT DELETE ====================

    /// Marks a contact deleted. Returns false when it was already gone.
    pub fn soft_delete_contact(&self, id: ContactId) -> Result<bool> {
        let now = format_timestamp(&Utc::now());
        let changed = self.conn.execute(
            "UPDATE contacts SET deleted_at = ?2, updated_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            params![id, now],
        )?;
        Ok(changed > 0)
    }
}

impl ContactStore for Database {
    fn find_matching(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
    ) -> Result<Vec<Contact>> {
        let mut clauses = Vec::new();
        let mut values: Vec<&str> = Vec::new();
        if let Some(email) = email {
            clauses.push("email = ?");
            values.push(email);
        }
        if let Some(phone_number) = phone_number {
            clauses.push("phone_number = ?");
            values.push(phone_number);
        }
        if clauses.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE deleted_at IS NULL AND ({})
             ORDER BY created_at ASC, id ASC",
            clauses.join(" OR ")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let contacts = stmt
            .query_map(params_from_iter(values), Self::row_to_contact)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(contacts)
    }

    fn find_cluster(&self, primary_ids: &[ContactId]) -> Result<Vec<Contact>> {
        if primary_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = id_placeholders(primary_ids.len());
        let sql = format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts
             WHERE deleted_at IS NULL
               AND (id IN ({placeholders}) OR linked_id IN ({placeholders}))
             ORDER BY created_at ASC, id ASC"
        );
        let values: Vec<&dyn rusqlite::ToSql> = primary_ids
            .iter()
            .map(|id| id as &dyn rusqlite::ToSql)
            .collect();
        self.query_contacts(&sql, &values)
    }

    fn create_primary(&self, email: Option<&str>, phone_number: Option<&str>) -> Result<Contact> {
        self.insert_contact(&NewContact::primary(
            email.map(str::to_string),
            phone_number.map(str::to_string),
        ))
    }

    fn create_secondary(
        &self,
        email: Option<&str>,
        phone_number: Option<&str>,
        linked_id: ContactId,
    ) -> Result<Contact> {
        if self.get_contact(linked_id)?.map_or(true, |c| !c.is_primary()) {
            return Err(Error::conflict(format!(
                "contact {linked_id} is no longer a live primary"
            )));
        }
        self.insert_contact(&NewContact::secondary(
            email.map(str::to_string),
            phone_number.map(str::to_string),
            linked_id,
        ))
    }

    fn demote_to_secondary(&self, id: ContactId, linked_id: ContactId) -> Result<()> {
        if id == linked_id {
            return Err(Error::invariant(format!("contact {id} cannot link to itself")));
        }
        let now = format_timestamp(&Utc::now());

        self.with_savepoint("demote_contact", |conn| {
            let changed = conn.execute(
                r#"UPDATE contacts
                   SET link_precedence = 'secondary', linked_id = ?2, updated_at = ?3
                   WHERE id = ?1 AND link_precedence = 'primary' AND deleted_at IS NULL
                     AND EXISTS (
                         SELECT 1 FROM contacts
                         WHERE id = ?2 AND link_precedence = 'primary' AND deleted_at IS NULL
                     )"#,
                params![id, linked_id, now],
            )?;
            if changed == 0 {
                return Err(Error::conflict(format!(
                    "cannot demote contact {id} under {linked_id}: one of them is no longer a live primary"
                )));
            }

            // Former secondaries of the demoted row follow it to the survivor.
            conn.execute(
                r#"UPDATE contacts SET linked_id = ?2, updated_at = ?3
                   WHERE linked_id = ?1 AND link_precedence = 'secondary'"#,
                params![id, linked_id, now],
            )?;
            Ok(())
        })
    }

    fn repoint_secondary(&self, id: ContactId, linked_id: ContactId) -> Result<()> {
        let now = format_timestamp(&Utc::now());
        let changed = self.conn.execute(
            r#"UPDATE contacts SET linked_id = ?2, updated_at = ?3
               WHERE id = ?1 AND link_precedence = 'secondary' AND deleted_at IS NULL
                 AND EXISTS (
                     SELECT 1 FROM contacts
                     WHERE id = ?2 AND link_precedence = 'primary' AND deleted_at IS NULL
                 )"#,
            params![id, linked_id, now],
        )?;
        if changed == 0 {
            return Err(Error::conflict(format!(
                "cannot repoint contact {id} to {linked_id}"
            )));
        }
        Ok(())
    }

    fn atomically<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        self.in_transaction(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn backdated(db: &Database, email: &str, phone: &str, year: i32, month: u32) -> Contact {
        let mut new = NewContact::primary(Some(email.to_string()), Some(phone.to_string()));
        new.created_at = Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).unwrap();
        db.insert_contact(&new).unwrap()
    }

    #[test]
    fn test_create_and_get_contact() {
        let db = Database::open_memory().unwrap();

        let contact = db
            .create_primary(Some("newuser@test.com"), Some("555000"))
            .unwrap();
        assert!(contact.is_primary());
        assert_eq!(contact.linked_id, None);

        let retrieved = db.get_contact(contact.id).unwrap().unwrap();
        assert_eq!(retrieved, contact);
    }

    #[test]
    fn test_find_matching_either_value() {
        let db = Database::open_memory().unwrap();
        let a = db.create_primary(Some("a@test.com"), Some("111")).unwrap();
        let b = db.create_primary(Some("b@test.com"), Some("222")).unwrap();
        db.create_primary(Some("c@test.com"), Some("333")).unwrap();

        let found = db.find_matching(Some("a@test.com"), Some("222")).unwrap();
        let ids: Vec<_> = found.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);

        let found = db.find_matching(None, Some("111")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, a.id);

        assert!(db.find_matching(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_find_matching_orders_by_creation() {
        let db = Database::open_memory().unwrap();
        let newer = backdated(&db, "x@test.com", "900", 2023, 6);
        let older = backdated(&db, "y@test.com", "900", 2023, 1);

        let found = db.find_matching(None, Some("900")).unwrap();
        let ids: Vec<_> = found.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![older.id, newer.id]);
    }

    #[test]
    fn test_find_matching_skips_soft_deleted() {
        let db = Database::open_memory().unwrap();
        let contact = db
            .create_primary(Some("deleted@test.com"), Some("555000"))
            .unwrap();
        assert!(db.soft_delete_contact(contact.id).unwrap());
        assert!(!db.soft_delete_contact(contact.id).unwrap());

        let found = db
            .find_matching(Some("deleted@test.com"), Some("555000"))
            .unwrap();
        assert!(found.is_empty());
        assert!(db.get_contact(contact.id).unwrap().is_none());
    }

    #[test]
    fn test_find_cluster() {
        let db = Database::open_memory().unwrap();
        let primary = db.create_primary(Some("p@test.com"), None).unwrap();
        let secondary = db
            .create_secondary(Some("s@test.com"), None, primary.id)
            .unwrap();
        db.create_primary(Some("other@test.com"), None).unwrap();

        let cluster = db.find_cluster(&[primary.id]).unwrap();
        let ids: Vec<_> = cluster.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![primary.id, secondary.id]);
        assert!(db.find_cluster(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_demote_moves_children() {
        let db = Database::open_memory().unwrap();
        let old = backdated(&db, "alpha@test.com", "111", 2023, 1);
        let young = backdated(&db, "beta@test.com", "222", 2023, 2);
        let child = db
            .create_secondary(Some("gamma@test.com"), None, young.id)
            .unwrap();

        db.demote_to_secondary(young.id, old.id).unwrap();

        let young = db.get_contact(young.id).unwrap().unwrap();
        assert_eq!(young.link_precedence, LinkPrecedence::Secondary);
        assert_eq!(young.linked_id, Some(old.id));

        let child = db.get_contact(child.id).unwrap().unwrap();
        assert_eq!(child.linked_id, Some(old.id));
    }

    #[test]
    fn test_demote_requires_live_primaries() {
        let db = Database::open_memory().unwrap();
        let a = db.create_primary(Some("a@test.com"), None).unwrap();
        let b = db.create_primary(Some("b@test.com"), None).unwrap();
        db.demote_to_secondary(b.id, a.id).unwrap();

        // b is no longer primary
        let err = db.demote_to_secondary(b.id, a.id).unwrap_err();
        assert!(err.is_retryable());

        // target must be a primary
        let c = db.create_primary(Some("c@test.com"), None).unwrap();
        let err = db.demote_to_secondary(c.id, b.id).unwrap_err();
        assert!(err.is_retryable());
        assert!(db.get_contact(c.id).unwrap().unwrap().is_primary());

        assert!(db.demote_to_secondary(a.id, a.id).is_err());
    }

    #[test]
    fn test_repoint_secondary() {
        let db = Database::open_memory().unwrap();
        let a = db.create_primary(Some("a@test.com"), None).unwrap();
        let b = db.create_primary(Some("b@test.com"), None).unwrap();
        let s = db.create_secondary(Some("s@test.com"), None, b.id).unwrap();

        db.repoint_secondary(s.id, a.id).unwrap();
        assert_eq!(db.get_contact(s.id).unwrap().unwrap().linked_id, Some(a.id));

        // a primary is not repointable and a secondary is not a valid target
        assert!(db.repoint_secondary(b.id, a.id).is_err());
        assert!(db.repoint_secondary(s.id, s.id).is_err());
    }

    #[test]
    fn test_create_secondary_requires_primary() {
        let db = Database::open_memory().unwrap();
        let a = db.create_primary(Some("a@test.com"), None).unwrap();
        let s = db.create_secondary(None, Some("1"), a.id).unwrap();

        let err = db.create_secondary(None, Some("2"), s.id).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_empty_identity_rejected_by_schema() {
        let db = Database::open_memory().unwrap();
        let err = db.create_primary(None, None).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StoreConflict);
        assert_eq!(db.count_contacts().unwrap(), 0);
    }
}
