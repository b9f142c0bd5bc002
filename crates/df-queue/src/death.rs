//! Dead-letter transit count
//!
//! The broker appends/updates an entry in the `x-death` header each time a
//! message is dead-lettered. Entries are tables with (among others) `queue`,
//! `reason` and `count` fields.

use lapin::types::{AMQPValue, FieldTable, ShortString};

pub const X_DEATH_HEADER: &str = "x-death";

/// Number of times a message was dead-lettered out of `queue`.
///
/// Falls back to the largest count of any entry when none names `queue`,
/// and to 0 when the header is absent or malformed.
pub fn death_count(headers: Option<&FieldTable>, queue: &str) -> u32 {
    let entries = match headers.and_then(|h| h.inner().get(&ShortString::from(X_DEATH_HEADER))) {
        Some(AMQPValue::FieldArray(entries)) => entries,
        _ => return 0,
    };

    let mut max = 0;
    for entry in entries.as_slice() {
        let AMQPValue::FieldTable(table) = entry else {
            continue;
        };
        let fields = table.inner();
        let count = fields
            .get(&ShortString::from("count"))
            .and_then(as_count)
            .unwrap_or(0);

        if fields
            .get(&ShortString::from("queue"))
            .is_some_and(|value| string_eq(value, queue))
        {
            return count;
        }
        max = max.max(count);
    }
    max
}

fn as_count(value: &AMQPValue) -> Option<u32> {
    let count: i64 = match value {
        AMQPValue::ShortShortInt(v) => (*v).into(),
        AMQPValue::ShortShortUInt(v) => (*v).into(),
        AMQPValue::ShortInt(v) => (*v).into(),
        AMQPValue::ShortUInt(v) => (*v).into(),
        AMQPValue::LongInt(v) => (*v).into(),
        AMQPValue::LongUInt(v) => (*v).into(),
        AMQPValue::LongLongInt(v) => *v,
        _ => return None,
    };
    Some(u32::try_from(count.max(0)).unwrap_or(u32::MAX))
}

fn string_eq(value: &AMQPValue, expected: &str) -> bool {
    match value {
        AMQPValue::LongString(s) => s.as_bytes() == expected.as_bytes(),
        AMQPValue::ShortString(s) => s.as_str() == expected,
        _ => false,
    }
}
