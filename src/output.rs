//! Printing of streamed records
//!
//! Records are written one per line, either as a short human-readable
//! summary or as JSON. Printing happens while the stream is drained so the
//! first records show up before the last page is fetched.

use serde::Serialize;
use std::io::{self, Write};

use crate::resources::{Currency, Expense, Friend, Group, MainCategory, Notification};
use crate::stream::ResultStream;

/// One-line human-readable rendering of a record
pub trait Summary {
    fn summary(&self) -> String;
}

impl Summary for Expense {
    fn summary(&self) -> String {
        let kind = if self.payment { " (payment)" } else { "" };
        format!(
            "{}  {}  {} {}  {}{}",
            self.id,
            self.date.format("%Y-%m-%d"),
            self.cost,
            self.currency_code,
            self.description,
            kind
        )
    }
}

impl Summary for Friend {
    fn summary(&self) -> String {
        let balances: Vec<String> = self
            .balance
            .iter()
            .map(|b| format!("{} {}", b.amount, b.currency_code))
            .collect();
        if balances.is_empty() {
            format!("{}  {}  settled up", self.id, self.display_name())
        } else {
            format!("{}  {}  {}", self.id, self.display_name(), balances.join(", "))
        }
    }
}

impl Summary for Group {
    fn summary(&self) -> String {
        format!("{}  {}  {} members", self.id, self.name, self.members.len())
    }
}

impl Summary for Notification {
    fn summary(&self) -> String {
        format!(
            "{}  {}  {}",
            self.id,
            self.created_at.format("%Y-%m-%d %H:%M"),
            strip_tags(&self.content)
        )
    }
}

impl Summary for MainCategory {
    fn summary(&self) -> String {
        if self.subcategories.is_empty() {
            return format!("{}  {}", self.id, self.name);
        }
        let subcategories: Vec<&str> = self.subcategories.iter().map(|c| c.name.as_str()).collect();
        format!("{}  {}  [{}]", self.id, self.name, subcategories.join(", "))
    }
}

impl Summary for Currency {
    fn summary(&self) -> String {
        format!("{}  {}", self.currency_code, self.unit)
    }
}

/// Removes HTML tags from notification content
fn strip_tags(content: &str) -> String {
    let mut text = String::with_capacity(content.len());
    let mut in_tag = false;
    for c in content.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text
}

/// Writes one record as a single line
pub fn write_record<T, W>(out: &mut W, record: &T, json: bool) -> io::Result<()>
where
    T: Summary + Serialize,
    W: Write,
{
    if json {
        serde_json::to_writer(&mut *out, record)?;
        writeln!(out)
    } else {
        writeln!(out, "{}", record.summary())
    }
}

/// Drains `stream`, printing every record accepted by `keep`
///
/// Stops after `take` printed records and closes the stream so the producer
/// stops fetching. Returns the number of records printed; the stream is left
/// to the caller to inspect for a terminal error.
pub async fn drain<T, W>(
    stream: &mut ResultStream<T>,
    take: Option<usize>,
    json: bool,
    keep: impl Fn(&T) -> bool,
    out: &mut W,
) -> io::Result<usize>
where
    T: Summary + Serialize + Send + 'static,
    W: Write,
{
    let mut printed = 0;
    if take == Some(0) {
        stream.close().await;
        return Ok(printed);
    }

    while let Some(record) = stream.next().await {
        if !keep(&record) {
            continue;
        }
        write_record(out, &record, json)?;
        printed += 1;

        if take == Some(printed) {
            stream.close().await;
            break;
        }
    }
    out.flush()?;
    Ok(printed)
}
