// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Tests for the change batch accumulator.

#[cfg(test)]
mod tests {
    use crate::batch::ChangeBatch;
    use crate::provider::ChangeAction;
    use hickory_proto::rr::RecordType;

    fn values(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_repeated_schedule_coalesces() {
        let mut batch = ChangeBatch::new();
        batch.schedule(
            ChangeAction::Create,
            "www.example.com.",
            RecordType::A,
            300,
            values(&["192.0.2.1"]),
        );
        batch.schedule(
            ChangeAction::Create,
            "WWW.Example.com.",
            RecordType::A,
            60,
            values(&["192.0.2.1", "192.0.2.2"]),
        );

        let changes = batch.changes();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].rrset.name, "www.example.com.");
        assert_eq!(changes[0].rrset.ttl, 300, "first TTL wins");
        assert_eq!(changes[0].rrset.values, values(&["192.0.2.1", "192.0.2.2"]));
    }

    #[test]
    fn test_keys_differ_by_action_and_type() {
        let mut batch = ChangeBatch::new();
        batch.schedule(ChangeAction::Delete, "a.example.com.", RecordType::A, 300, values(&["192.0.2.1"]));
        batch.schedule(ChangeAction::Create, "a.example.com.", RecordType::A, 300, values(&["192.0.2.2"]));
        batch.schedule(ChangeAction::Create, "a.example.com.", RecordType::AAAA, 300, values(&["2001:db8::1"]));

        let changes = batch.changes();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0].action, ChangeAction::Delete);
        assert_eq!(changes[1].action, ChangeAction::Create);
        assert_eq!(changes[2].rrset.record_type, RecordType::AAAA);
    }

    #[test]
    fn test_restate_replaces_create_values_in_place() {
        let mut batch = ChangeBatch::new();
        batch.schedule(ChangeAction::Delete, "a.example.com.", RecordType::A, 300, values(&["192.0.2.1"]));
        batch.restate("a.example.com.", RecordType::A, 300, &values(&["192.0.2.1", "192.0.2.2"]));
        batch.schedule(ChangeAction::Create, "b.example.com.", RecordType::A, 300, values(&["192.0.2.3"]));
        batch.restate("a.example.com.", RecordType::A, 120, &values(&["192.0.2.2"]));

        let changes = batch.changes();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[1].rrset.name, "a.example.com.");
        assert_eq!(changes[1].rrset.ttl, 120);
        assert_eq!(changes[1].rrset.values, values(&["192.0.2.2"]));
        assert_eq!(changes[2].rrset.name, "b.example.com.");
    }

    #[test]
    fn test_withdraw_keeps_order_of_remaining_entries() {
        let mut batch = ChangeBatch::new();
        batch.schedule(ChangeAction::Create, "a.example.com.", RecordType::A, 300, values(&["192.0.2.1"]));
        batch.schedule(ChangeAction::Create, "b.example.com.", RecordType::A, 300, values(&["192.0.2.2"]));
        batch.schedule(ChangeAction::Create, "c.example.com.", RecordType::A, 300, values(&["192.0.2.3"]));

        batch.withdraw(ChangeAction::Create, "b.example.com.", RecordType::A);
        batch.schedule(ChangeAction::Create, "c.example.com.", RecordType::A, 300, values(&["192.0.2.4"]));

        let changes = batch.changes();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].rrset.name, "a.example.com.");
        assert_eq!(changes[1].rrset.name, "c.example.com.");
        assert_eq!(changes[1].rrset.values, values(&["192.0.2.3", "192.0.2.4"]));
    }

    #[test]
    fn test_withdraw_missing_entry_is_noop() {
        let mut batch = ChangeBatch::new();
        batch.schedule(ChangeAction::Create, "a.example.com.", RecordType::A, 300, values(&["192.0.2.1"]));
        batch.withdraw(ChangeAction::Delete, "a.example.com.", RecordType::A);
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_clear() {
        let mut batch = ChangeBatch::new();
        batch.schedule(ChangeAction::Create, "a.example.com.", RecordType::A, 300, values(&["192.0.2.1"]));
        batch.clear();
        assert!(batch.is_empty());
        assert!(batch.changes().is_empty());
    }
}
