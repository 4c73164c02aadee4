//! Property-based round-trip tests for the row mapping and wire codec.
//!
//! Uses proptest to verify:
//! 1. Any task survives the typed -> row -> typed persistence mapping.
//! 2. Any wire message survives encode → decode.
//! 3. Random bytes never cause a panic in decode (returns `Err` gracefully).

use chrono::{DateTime, NaiveDate, Utc};
use proptest::prelude::*;
use uuid::Uuid;

use taskflow_proto::codec;
use taskflow_proto::row::TaskRow;
use taskflow_proto::task::{Category, Priority, Recurrence, Task, TaskId};
use taskflow_proto::wire::{ClientMessage, ServerMessage};

// --- Arbitrary implementations for model types ---

/// Strategy for generating arbitrary `TaskId` values.
fn arb_task_id() -> impl Strategy<Value = TaskId> {
    any::<u128>().prop_map(|n| TaskId::from_uuid(Uuid::from_u128(n)))
}

/// Strategy for generating arbitrary calendar dates. Days capped at 28 so
/// every (year, month, day) combination is a real date.
fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (1970i32..2200, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).expect("valid date"))
}

/// Strategy for generating arbitrary UTC timestamps (second precision,
/// matching what survives an RFC 3339 column).
fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_000_000_000).prop_map(|s| DateTime::from_timestamp(s, 0).expect("valid timestamp"))
}

/// Strategy for generating arbitrary `Priority` values.
fn arb_priority() -> impl Strategy<Value = Priority> {
    prop_oneof![
        Just(Priority::High),
        Just(Priority::Medium),
        Just(Priority::Low),
    ]
}

/// Strategy for generating arbitrary `Category` values.
fn arb_category() -> impl Strategy<Value = Category> {
    prop_oneof![
        Just(Category::Personal),
        Just(Category::Work),
        Just(Category::Health),
        Just(Category::Shopping),
        Just(Category::Other),
    ]
}

/// Strategy for generating arbitrary `Recurrence` values.
fn arb_recurrence() -> impl Strategy<Value = Recurrence> {
    prop_oneof![
        Just(Recurrence::None),
        Just(Recurrence::Daily),
        Just(Recurrence::Weekly),
        Just(Recurrence::Monthly),
        Just(Recurrence::Yearly),
    ]
}

/// Strategy for generating arbitrary `Task` values. Completion state and
/// timestamp are generated together to keep them consistent.
fn arb_task() -> impl Strategy<Value = Task> {
    (
        (
            arb_task_id(),
            "[^\x00]{1,64}",
            "[^\x00]{0,128}",
            prop::option::of(arb_date()),
        ),
        (arb_priority(), arb_category(), arb_recurrence()),
        (prop::option::of(arb_timestamp()), arb_timestamp()),
    )
        .prop_map(
            |(
                (id, title, description, due_date),
                (priority, category, recurrence),
                (completed_at, created_at),
            )| Task {
                id,
                title,
                description,
                due_date,
                priority,
                category,
                recurrence,
                completed: completed_at.is_some(),
                completed_at,
                created_at,
            },
        )
}

/// Strategy for generating arbitrary account ids.
fn arb_account() -> impl Strategy<Value = String> {
    "[a-z0-9-]{1,16}".prop_map(String::from)
}

/// Strategy for generating arbitrary `TaskRow` values via the mapping.
fn arb_task_row() -> impl Strategy<Value = TaskRow> {
    (arb_task(), arb_account()).prop_map(|(task, account)| TaskRow::from_task(&task, &account))
}

/// Strategy for generating arbitrary `ClientMessage` values.
fn arb_client_message() -> impl Strategy<Value = ClientMessage> {
    prop_oneof![
        arb_account().prop_map(|account_id| ClientMessage::Hello { account_id }),
        Just(ClientMessage::FetchAll),
        Just(ClientMessage::ListIds),
        arb_task_row().prop_map(ClientMessage::Insert),
        prop::collection::vec(arb_task_row(), 0..8).prop_map(ClientMessage::InsertMany),
        arb_task_row().prop_map(ClientMessage::Update),
        "[^\x00]{1,40}".prop_map(|id| ClientMessage::Delete { id }),
    ]
}

/// Strategy for generating arbitrary `ServerMessage` values.
fn arb_server_message() -> impl Strategy<Value = ServerMessage> {
    prop_oneof![
        arb_account().prop_map(|account_id| ServerMessage::Welcome { account_id }),
        prop::collection::vec(arb_task_row(), 0..8).prop_map(ServerMessage::Rows),
        prop::collection::vec("[^\x00]{1,40}", 0..8).prop_map(ServerMessage::Ids),
        Just(ServerMessage::Ack),
        Just(ServerMessage::Changed),
        "[^\x00]{0,80}".prop_map(|reason| ServerMessage::Error { reason }),
    ]
}

// --- Property tests ---

proptest! {
    /// Any task survives the typed -> row -> typed persistence mapping,
    /// every field intact.
    #[test]
    fn task_row_mapping_is_lossless(task in arb_task(), account in arb_account()) {
        let row = TaskRow::from_task(&task, &account);
        prop_assert_eq!(&row.user_id, &account);
        let back = row.into_task().expect("row built from a task must decode");
        prop_assert_eq!(back, task);
    }

    /// Any valid ClientMessage survives an encode → decode round-trip.
    #[test]
    fn client_message_round_trip(msg in arb_client_message()) {
        let bytes = codec::encode_client(&msg).expect("encode should succeed");
        let decoded = codec::decode_client(&bytes).expect("decode should succeed");
        prop_assert_eq!(msg, decoded);
    }

    /// Any valid ServerMessage survives an encode → decode round-trip.
    #[test]
    fn server_message_round_trip(msg in arb_server_message()) {
        let bytes = codec::encode_server(&msg).expect("encode should succeed");
        let decoded = codec::decode_server(&bytes).expect("decode should succeed");
        prop_assert_eq!(msg, decoded);
    }

    /// Random bytes never panic the decoders; they fail gracefully.
    #[test]
    fn random_bytes_never_panic_decoders(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode_client(&bytes);
        let _ = codec::decode_server(&bytes);
    }

    /// A row whose vocabulary column is corrupted is rejected, not coerced.
    #[test]
    fn corrupted_vocabulary_is_rejected(task in arb_task(), junk in "[a-z]{1,12}") {
        prop_assume!(junk.parse::<Priority>().is_err());
        let mut row = TaskRow::from_task(&task, "acct");
        row.priority = junk;
        prop_assert!(row.into_task().is_err());
    }
}
