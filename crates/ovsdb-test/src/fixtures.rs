//! Row fixtures for the OVN global tables.

use crate::fake::FakeOvsdb;
use ovsdb_types::{Atom, Columns, Uuid, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const NB_DATABASE: &str = "OVN_Northbound";
pub const SB_DATABASE: &str = "OVN_Southbound";
pub const NB_GLOBAL: &str = "NB_Global";
pub const SB_GLOBAL: &str = "SB_Global";

/// Builds a string map from pairs.
pub fn string_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Columns of a global row carrying the given options.
pub fn global_row(options: &[(&str, &str)]) -> Columns {
    let mut columns = Columns::new();
    columns.insert("options".to_string(), Value::string_map(&string_map(options)));
    columns.insert("nb_cfg".to_string(), Value::Atom(Atom::Integer(0)));
    columns
}

/// A northbound database with one `NB_Global` row.
pub fn northbound(options: &[(&str, &str)]) -> (Arc<FakeOvsdb>, Uuid) {
    let db = FakeOvsdb::new(NB_DATABASE, [NB_GLOBAL]);
    let uuid = db.insert_row(NB_GLOBAL, global_row(options));
    (db, uuid)
}

/// A southbound database with one `SB_Global` row.
pub fn southbound(options: &[(&str, &str)]) -> (Arc<FakeOvsdb>, Uuid) {
    let db = FakeOvsdb::new(SB_DATABASE, [SB_GLOBAL]);
    let uuid = db.insert_row(SB_GLOBAL, global_row(options));
    (db, uuid)
}
