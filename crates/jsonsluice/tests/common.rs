#![allow(dead_code, missing_docs)]

use std::{
    io,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    task::{Context, Poll},
};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, ReadBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub n: u32,
    pub t: String,
}

const ONES: [&str; 20] = [
    "zero", "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven", "twelve",
    "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
];
const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

/// English name of `n`, for `n` below one million.
pub fn to_english(n: u32) -> String {
    let name = |i: u32| ONES[i as usize];
    match n {
        0..=19 => name(n).to_owned(),
        20..=99 => {
            let tens = TENS[(n / 10) as usize];
            if n % 10 == 0 {
                tens.to_owned()
            } else {
                format!("{tens}-{}", name(n % 10))
            }
        }
        100..=999 => {
            let head = format!("{} hundred", name(n / 100));
            if n % 100 == 0 { head } else { format!("{head} {}", to_english(n % 100)) }
        }
        _ => {
            let head = format!("{} thousand", to_english(n / 1000));
            if n % 1000 == 0 { head } else { format!("{head} {}", to_english(n % 1000)) }
        }
    }
}

pub fn entries(count: u32) -> Vec<Entry> {
    (0..count).map(|n| Entry { n, t: to_english(n) }).collect()
}

/// `entries(count)` as a compact JSON array.
pub fn entries_body(count: u32) -> Vec<u8> {
    serde_json::to_vec(&entries(count)).unwrap()
}

/// Shared view of what happened to a [`TrackedSource`].
#[derive(Debug, Clone, Default)]
pub struct Tracker {
    read: Arc<AtomicUsize>,
    dropped: Arc<AtomicBool>,
}

impl Tracker {
    pub fn bytes_read(&self) -> usize {
        self.read.load(Ordering::SeqCst)
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

/// In-memory source that hands out at most `step` bytes per read and records
/// how much was read and when it is dropped.
#[derive(Debug)]
pub struct TrackedSource {
    body: Vec<u8>,
    pos: usize,
    step: usize,
    tracker: Tracker,
}

impl TrackedSource {
    pub fn new(body: Vec<u8>, step: usize) -> (Self, Tracker) {
        let tracker = Tracker::default();
        let source = Self {
            body,
            pos: 0,
            step: step.max(1),
            tracker: tracker.clone(),
        };
        (source, tracker)
    }
}

impl AsyncRead for TrackedSource {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let end = (this.pos + this.step)
            .min(this.pos + buf.remaining())
            .min(this.body.len());
        buf.put_slice(&this.body[this.pos..end]);
        this.tracker.read.fetch_add(end - this.pos, Ordering::SeqCst);
        this.pos = end;
        Poll::Ready(Ok(()))
    }
}

impl Drop for TrackedSource {
    fn drop(&mut self) {
        self.tracker.dropped.store(true, Ordering::SeqCst);
    }
}
