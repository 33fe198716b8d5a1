//! Per-page statistics
//!
//! Counts and encoded sizes gathered while walking a page's cells. Sizes of
//! timestamps and transaction IDs are the packed byte counts, not the values.

use super::cell::TimeFlags;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStatistics {
    pub num_keys: u64,
    pub keys_sz: u64,

    pub num_d_start_ts: u64,
    pub d_start_ts_sz: u64,
    pub num_d_stop_ts: u64,
    pub d_stop_ts_sz: u64,
    pub num_start_ts: u64,
    pub start_ts_sz: u64,
    pub num_stop_ts: u64,
    pub stop_ts_sz: u64,

    pub num_start_txn: u64,
    pub start_txn_sz: u64,
    pub num_stop_txn: u64,
    pub stop_txn_sz: u64,
}

impl PageStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_key(&mut self, length: u64) {
        self.num_keys += 1;
        self.keys_sz += length;
    }

    /// Record one packed time window field of `size` encoded bytes
    ///
    /// `field` must be a single flag; prepare and unused bits are ignored.
    pub fn record_time_field(&mut self, field: TimeFlags, size: usize) {
        let size = size as u64;
        let (count, total) = if field == TimeFlags::DURABLE_START_TS {
            (&mut self.num_d_start_ts, &mut self.d_start_ts_sz)
        } else if field == TimeFlags::DURABLE_STOP_TS {
            (&mut self.num_d_stop_ts, &mut self.d_stop_ts_sz)
        } else if field == TimeFlags::START_TS {
            (&mut self.num_start_ts, &mut self.start_ts_sz)
        } else if field == TimeFlags::STOP_TS {
            (&mut self.num_stop_ts, &mut self.stop_ts_sz)
        } else if field == TimeFlags::START_TXN {
            (&mut self.num_start_txn, &mut self.start_txn_sz)
        } else if field == TimeFlags::STOP_TXN {
            (&mut self.num_stop_txn, &mut self.stop_txn_sz)
        } else {
            return;
        };
        *count += 1;
        *total += size;
    }

    /// Timestamps of every kind
    pub fn num_ts(&self) -> u64 {
        self.num_d_start_ts + self.num_d_stop_ts + self.num_start_ts + self.num_stop_ts
    }

    pub fn ts_sz(&self) -> u64 {
        self.d_start_ts_sz + self.d_stop_ts_sz + self.start_ts_sz + self.stop_ts_sz
    }

    /// Transaction IDs of both kinds
    pub fn num_txn(&self) -> u64 {
        self.num_start_txn + self.num_stop_txn
    }

    pub fn txn_sz(&self) -> u64 {
        self.start_txn_sz + self.stop_txn_sz
    }

    /// Values in report column order, derived totals included
    pub fn columns(&self) -> [u64; 18] {
        [
            self.num_keys,
            self.keys_sz,
            self.num_d_start_ts,
            self.d_start_ts_sz,
            self.num_d_stop_ts,
            self.d_stop_ts_sz,
            self.num_start_ts,
            self.start_ts_sz,
            self.num_stop_ts,
            self.stop_ts_sz,
            self.num_ts(),
            self.ts_sz(),
            self.num_start_txn,
            self.start_txn_sz,
            self.num_stop_txn,
            self.stop_txn_sz,
            self.num_txn(),
            self.txn_sz(),
        ]
    }
}

/// Column names matching [`PageStatistics::columns`]
pub const COLUMN_NAMES: [&str; 18] = [
    "num keys",
    "keys size",
    "num durable start ts",
    "durable start ts size",
    "num durable stop ts",
    "durable stop ts size",
    "num start ts",
    "start ts size",
    "num stop ts",
    "stop ts size",
    "num ts",
    "ts size",
    "num start txn",
    "start txn size",
    "num stop txn",
    "stop txn size",
    "num txn",
    "txn size",
];
