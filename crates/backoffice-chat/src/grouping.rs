use chrono::{Local, NaiveDate, TimeDelta, TimeZone};
use serde::Serialize;

use backoffice_types::ChatMessage;

/// Consecutive messages from one sender stay in the same bubble while each
/// follows the previous one by at most this many minutes (inclusive).
pub const GROUP_WINDOW_MINUTES: i64 = 3;

/// All messages sent on one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayBucket<'a> {
    pub day: NaiveDate,
    pub groups: Vec<MessageGroup<'a>>,
}

/// A maximal run of messages from one sender, each within the window of the
/// one before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageGroup<'a> {
    pub sender_id: &'a str,
    pub messages: Vec<&'a ChatMessage>,
}

impl<'a> MessageGroup<'a> {
    fn accepts(&self, message: &ChatMessage) -> bool {
        self.sender_id == message.sender_id
            && self.messages.last().is_some_and(|last| {
                message.created_at - last.created_at <= TimeDelta::minutes(GROUP_WINDOW_MINUTES)
            })
    }
}

impl<'a> DayBucket<'a> {
    fn new(day: NaiveDate) -> Self {
        Self {
            day,
            groups: Vec::new(),
        }
    }

    fn push(&mut self, message: &'a ChatMessage) {
        match self.groups.last_mut() {
            Some(group) if group.accepts(message) => group.messages.push(message),
            _ => self.groups.push(MessageGroup {
                sender_id: &message.sender_id,
                messages: vec![message],
            }),
        }
    }
}

/// Group by calendar day in the machine's local time zone.
pub fn group_messages(messages: &[ChatMessage]) -> Vec<DayBucket<'_>> {
    group_messages_in(messages, &Local)
}

/// Sort by `created_at` (stable for equal timestamps), then split into day
/// buckets in `tz` and sender groups within each day. Every message lands in
/// exactly one group; an empty slice yields no buckets.
pub fn group_messages_in<'a, Tz: TimeZone>(messages: &'a [ChatMessage], tz: &Tz) -> Vec<DayBucket<'a>> {
    let mut sorted: Vec<&ChatMessage> = messages.iter().collect();
    sorted.sort_by_key(|message| message.created_at);

    let mut days = Vec::new();
    let mut current: Option<DayBucket<'a>> = None;

    for message in sorted {
        let day = message.created_at.with_timezone(tz).date_naive();
        let mut bucket = match current.take() {
            Some(bucket) if bucket.day == day => bucket,
            Some(finished) => {
                days.push(finished);
                DayBucket::new(day)
            }
            None => DayBucket::new(day),
        };
        bucket.push(message);
        current = Some(bucket);
    }

    days.extend(current);
    days
}
