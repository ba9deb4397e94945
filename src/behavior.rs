//! Result recording for conformance-test clients.
//!
//! A conformance run calls into a test client once per behavior, with
//! parameters chosen by the test driver. The client reports what happened
//! through a [`Behavior`]: any number of `pass`, `fail` and `skip` entries
//! per call. A [`BehaviorTester`] collects them so the client can serialize
//! the lot back to the driver.
//!
//! ```rust
//! use std::collections::HashMap;
//! use ferry::behavior::{BasicEntryBuilder, BehaviorTester};
//!
//! let params = HashMap::from([("transport".to_owned(), "http".to_owned())]);
//! let mut tester = BehaviorTester::new(params);
//!
//! let mut b = tester.new_behavior(&BasicEntryBuilder);
//! let transport = b.param("transport").unwrap_or_default().to_owned();
//! if transport == "http" {
//!     b.passf(format_args!("served over {transport}"));
//! } else {
//!     b.skipf(format_args!("unsupported transport {transport:?}"));
//! }
//!
//! assert!(!tester.failed);
//! assert_eq!(tester.entries.len(), 1);
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one entry.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Skipped,
    Failed,
}

/// Read access to the parameters of a behavior run.
pub trait Params {
    fn param(&self, name: &str) -> Option<&str>;
}

impl Params for HashMap<String, String> {
    fn param(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// Builds the serialized entry for each reported outcome.
///
/// Custom builders can attach extra fields (the request that was sent, the
/// server that answered) to every entry.
pub trait EntryBuilder {
    fn skip(&self, reason: &str) -> Value;
    fn fail(&self, message: &str) -> Value;
    fn pass(&self, output: &str) -> Value;
}

/// The smallest useful entry: a status and a line of output.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct BasicEntry {
    pub status: Status,
    pub output: String,
}

/// [`EntryBuilder`] producing [`BasicEntry`] values.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasicEntryBuilder;

impl BasicEntryBuilder {
    fn entry(status: Status, output: &str) -> Value {
        serde_json::json!(BasicEntry { status, output: output.to_owned() })
    }
}

impl EntryBuilder for BasicEntryBuilder {
    fn skip(&self, reason: &str) -> Value {
        Self::entry(Status::Skipped, reason)
    }

    fn fail(&self, message: &str) -> Value {
        Self::entry(Status::Failed, message)
    }

    fn pass(&self, output: &str) -> Value {
        Self::entry(Status::Passed, output)
    }
}

/// Collects entries for one behavior call.
#[derive(Debug, Default)]
pub struct BehaviorTester {
    pub params: HashMap<String, String>,
    pub failed: bool,
    pub skipped: bool,
    pub entries: Vec<Value>,
}

impl BehaviorTester {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self { params, ..Self::default() }
    }

    /// A [`Behavior`] that records into this tester using `builder`.
    pub fn new_behavior<'t>(&'t mut self, builder: &'t dyn EntryBuilder) -> Behavior<'t> {
        Behavior { tester: self, builder }
    }

    fn put_entry(&mut self, entry: Value, status: Status) {
        match status {
            Status::Failed => self.failed = true,
            Status::Skipped => self.skipped = true,
            Status::Passed => {}
        }
        self.entries.push(entry);
    }
}

/// Parameters plus a way to report outcomes, handed to a test body.
///
/// Every call appends an entry; a single behavior may report several.
pub struct Behavior<'t> {
    tester: &'t mut BehaviorTester,
    builder: &'t dyn EntryBuilder,
}

impl Behavior<'_> {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.tester.params.param(name)
    }

    pub fn skip(&mut self, reason: &str) {
        let entry = self.builder.skip(reason);
        self.tester.put_entry(entry, Status::Skipped);
    }

    pub fn fail(&mut self, message: &str) {
        let entry = self.builder.fail(message);
        self.tester.put_entry(entry, Status::Failed);
    }

    pub fn pass(&mut self, output: &str) {
        let entry = self.builder.pass(output);
        self.tester.put_entry(entry, Status::Passed);
    }

    pub fn skipf(&mut self, args: fmt::Arguments<'_>) {
        self.skip(&args.to_string());
    }

    pub fn failf(&mut self, args: fmt::Arguments<'_>) {
        self.fail(&args.to_string());
    }

    pub fn passf(&mut self, args: fmt::Arguments<'_>) {
        self.pass(&args.to_string());
    }
}

impl Params for Behavior<'_> {
    fn param(&self, name: &str) -> Option<&str> {
        Behavior::param(self, name)
    }
}
