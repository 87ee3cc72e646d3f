//! Sync negotiation: each side forms an opinion from its own schema and the
//! peer's schema string, then both opinions are combined into a strategy.
//!
//! Opinions are deliberately one-sided and cheap to form; neither side needs
//! the other's opinion to produce its own. The strategy conclusion is the
//! only place both meet, and it is symmetric enough that the two sides reach
//! mirrored strategies from swapped inputs.

mod codec;
mod parcel;

pub use codec::{calculate_parcel_len, deserialize_data, serialize_data};
pub use parcel::{ParcelReader, ParcelWriter};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::constants::SCHEMA_SUPPORT_VERSION_V2_1;
use crate::document::{FlatbufferSchemaDecoder, SchemaObject, SchemaType};
use crate::relational::RelationalSchemaObject;

/// One side's judgement about syncing with a peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOpinion {
    pub permit_sync: bool,
    /// This side cannot use the peer's data as-is and asks the peer to
    /// convert before sending.
    pub require_peer_convert: bool,
    /// Incoming data must be checked against the local schema on receive.
    pub check_on_receive: bool,
}

impl SyncOpinion {
    fn new(permit_sync: bool, require_peer_convert: bool, check_on_receive: bool) -> Self {
        SyncOpinion {
            permit_sync,
            require_peer_convert,
            check_on_receive,
        }
    }
}

/// The combined plan for one sync direction, concluded from both opinions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStrategy {
    pub permit_sync: bool,
    pub convert_on_send: bool,
    pub convert_on_receive: bool,
    pub check_on_receive: bool,
}

/// Per-table opinions of a relational store, keyed by table name.
pub type RelationalSyncOpinion = BTreeMap<String, SyncOpinion>;

/// Per-table strategies of a relational store, keyed by table name.
pub type RelationalSyncStrategy = BTreeMap<String, SyncStrategy>;

/// Forms the local opinion for a document (or schemaless) store.
///
/// `remote_type_tag` is the peer's advertised schema kind;
/// `remote_schema` its schema string, decoded through `decoder` when the
/// local store uses FlatBuffer schemas.
pub fn make_local_sync_opinion(
    local_schema: &SchemaObject,
    remote_schema: &str,
    remote_type_tag: u8,
    decoder: Option<&dyn FlatbufferSchemaDecoder>,
) -> SyncOpinion {
    let local_type = local_schema.schema_type();
    let remote_type = SchemaType::from_wire_tag(remote_type_tag);
    // A peer of unknown kind may understand data this side cannot; let it
    // do any converting.
    if remote_type == SchemaType::Unrecognized {
        warn!(tag = remote_type_tag, "remote schema type unrecognized");
        return SyncOpinion::new(false, true, true);
    }
    // A schemaless local store accepts anything.
    if local_type == SchemaType::None {
        info!("local store is schemaless, permitting sync");
        return SyncOpinion::new(true, false, false);
    }
    // A schemaless peer sends unchecked data; accept it but verify.
    if remote_type == SchemaType::None {
        info!("remote store is schemaless, permitting sync with check");
        return SyncOpinion::new(true, false, true);
    }
    if local_type != remote_type {
        warn!(
            local = local_type.type_name(),
            remote = remote_type.type_name(),
            "schema type mismatch"
        );
        return SyncOpinion::new(false, true, true);
    }
    let mut remote_schema_obj = SchemaObject::new();
    let parse_result = match decoder {
        Some(decoder) => remote_schema_obj.parse_from_schema_string_with(remote_schema, decoder),
        None => remote_schema_obj.parse_from_schema_string(remote_schema),
    };
    if let Err(e) = parse_result {
        warn!(error = %e, "remote schema unparsable");
        return SyncOpinion::new(false, true, true);
    }
    // Remote equal to or an upgrade of local: its data fits here untouched.
    match local_schema.compare_against_schema_object(&remote_schema_obj) {
        Ok((verdict, _)) if !verdict.is_incompatible() => {
            return SyncOpinion::new(true, false, false);
        }
        _ => {}
    }
    // Local is the upgrade: the peer's older data fits after a check.
    match remote_schema_obj.compare_against_schema_object(local_schema) {
        Ok((verdict, _)) if !verdict.is_incompatible() => {
            return SyncOpinion::new(true, false, true);
        }
        _ => {}
    }
    warn!("local and remote schema mutually incompatible");
    SyncOpinion::new(false, true, true)
}

/// Concludes the strategy from both sides' opinions.
pub fn conclude_sync_strategy(local: &SyncOpinion, remote: &SyncOpinion) -> SyncStrategy {
    let mut permit_sync = local.permit_sync || remote.permit_sync;
    // Both sides waiting for the other to convert deadlocks; refuse instead.
    if local.require_peer_convert && remote.require_peer_convert {
        permit_sync = false;
    }
    let strategy = SyncStrategy {
        permit_sync,
        convert_on_send: !local.require_peer_convert,
        convert_on_receive: remote.require_peer_convert,
        check_on_receive: local.check_on_receive,
    };
    info!(
        permit = strategy.permit_sync,
        convert_on_send = strategy.convert_on_send,
        convert_on_receive = strategy.convert_on_receive,
        check_on_receive = strategy.check_on_receive,
        "sync strategy concluded"
    );
    strategy
}

/// Forms the per-table opinions for a relational store. Preconditions that
/// fail (kind, validity, parse, version, table mode) yield an empty map,
/// which concludes to an empty strategy and therefore no sync.
pub fn make_relational_sync_opinion(
    local_schema: &RelationalSchemaObject,
    remote_schema: &str,
    remote_type_tag: u8,
) -> RelationalSyncOpinion {
    let remote_type = SchemaType::from_wire_tag(remote_type_tag);
    if remote_type == SchemaType::Unrecognized {
        warn!(tag = remote_type_tag, "remote schema type unrecognized");
        return RelationalSyncOpinion::new();
    }
    if remote_type != SchemaType::Relative {
        warn!(remote = remote_type.type_name(), "remote store is not relational");
        return RelationalSyncOpinion::new();
    }
    if !local_schema.is_schema_valid() {
        warn!("local relational schema not valid");
        return RelationalSyncOpinion::new();
    }
    let mut remote_schema_obj = RelationalSchemaObject::new();
    if let Err(e) = remote_schema_obj.parse_from_schema_string(remote_schema) {
        warn!(error = %e, "remote relational schema unparsable");
        return RelationalSyncOpinion::new();
    }
    if local_schema.schema_version() != remote_schema_obj.schema_version() {
        warn!(
            local = local_schema.schema_version(),
            remote = remote_schema_obj.schema_version(),
            "relational schema version mismatch"
        );
        return RelationalSyncOpinion::new();
    }
    if local_schema.schema_version() == SCHEMA_SUPPORT_VERSION_V2_1
        && local_schema.table_mode() != remote_schema_obj.table_mode()
    {
        warn!("relational table mode mismatch");
        return RelationalSyncOpinion::new();
    }
    make_opinion_each_table(local_schema, &remote_schema_obj)
}

fn make_opinion_each_table(
    local_schema: &RelationalSchemaObject,
    remote_schema: &RelationalSchemaObject,
) -> RelationalSyncOpinion {
    let mut opinion = RelationalSyncOpinion::new();
    for (table_name, local_table) in local_schema.tables() {
        let remote_table = match remote_schema.get_table(table_name) {
            None => {
                warn!(table = %table_name, "table missing in remote schema");
                continue;
            }
            Some(table) => table,
        };
        let verdict = local_table.compare_with_table(remote_table, local_schema.schema_version());
        if !verdict.is_incompatible() {
            opinion.insert(table_name.clone(), SyncOpinion::new(true, false, false));
            continue;
        }
        let verdict = remote_table.compare_with_table(local_table, remote_schema.schema_version());
        if !verdict.is_incompatible() {
            opinion.insert(table_name.clone(), SyncOpinion::new(true, false, true));
            continue;
        }
        warn!(table = %table_name, "tables mutually incompatible");
        opinion.insert(table_name.clone(), SyncOpinion::new(false, true, true));
    }
    opinion
}

/// Concludes per-table strategies over the tables both opinions cover.
pub fn conclude_relational_sync_strategy(
    local: &RelationalSyncOpinion,
    remote: &RelationalSyncOpinion,
) -> RelationalSyncStrategy {
    let mut strategy = RelationalSyncStrategy::new();
    for (table_name, local_opinion) in local {
        let remote_opinion = match remote.get(table_name) {
            None => {
                warn!(table = %table_name, "table opinion missing from remote");
                continue;
            }
            Some(opinion) => opinion,
        };
        strategy.insert(
            table_name.clone(),
            conclude_sync_strategy(local_opinion, remote_opinion),
        );
    }
    strategy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mutual_convert_requirement_blocks_sync() {
        let opinion = SyncOpinion::new(false, true, true);
        let strategy = conclude_sync_strategy(&opinion, &opinion);
        assert!(!strategy.permit_sync);
    }

    #[test]
    fn test_one_sided_permit_is_enough() {
        let permitting = SyncOpinion::new(true, false, false);
        let refusing = SyncOpinion::new(false, true, true);
        let strategy = conclude_sync_strategy(&permitting, &refusing);
        assert!(strategy.permit_sync);
        // The refusing side asked for conversion, so this side converts on
        // receive and sends converted data.
        assert!(strategy.convert_on_send);
        assert!(strategy.convert_on_receive);
        assert!(!strategy.check_on_receive);
    }

    #[test]
    fn test_check_on_receive_is_local_only() {
        let local = SyncOpinion::new(true, false, true);
        let remote = SyncOpinion::new(true, false, false);
        assert!(conclude_sync_strategy(&local, &remote).check_on_receive);
        assert!(!conclude_sync_strategy(&remote, &local).check_on_receive);
    }
}
