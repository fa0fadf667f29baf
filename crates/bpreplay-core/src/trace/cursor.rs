//! Immutable trace and its forward-only read cursor.

use super::error::TraceError;
use super::model::Transaction;

/// An ordered capture of transactions. Never mutated once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    transactions: Vec<Transaction>,
}

impl Trace {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Start reading from the first transaction.
    pub fn cursor(&self) -> TraceCursor<'_> {
        TraceCursor {
            transactions: &self.transactions,
            pos: 0,
            skipped: Vec::new(),
        }
    }
}

impl From<Vec<Transaction>> for Trace {
    fn from(transactions: Vec<Transaction>) -> Self {
        Self::new(transactions)
    }
}

/// Read position into a [`Trace`].
///
/// `pos` is the index of the next unread transaction and only moves forward.
/// Returned transactions borrow the trace, not the cursor, so the cursor can
/// keep advancing while earlier transactions are still in use.
#[derive(Debug, Clone)]
pub struct TraceCursor<'t> {
    transactions: &'t [Transaction],
    pos: usize,
    skipped: Vec<&'t str>,
}

impl<'t> TraceCursor<'t> {
    /// Index of the next unread transaction.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.transactions.len()
    }

    /// Next transaction of any kind, comments included.
    ///
    /// This is the top-level iteration; decode logic uses
    /// [`peek_next`](Self::peek_next) and [`advance_next`](Self::advance_next).
    pub fn step(&mut self) -> Option<&'t Transaction> {
        let txn = self.transactions.get(self.pos)?;
        self.pos += 1;
        Some(txn)
    }

    fn next_index(&self) -> Result<usize, TraceError> {
        self.transactions[self.pos.min(self.transactions.len())..]
            .iter()
            .position(|t| !t.is_comment())
            .map(|offset| self.pos + offset)
            .ok_or(TraceError::OutOfTransactions {
                started: self.pos,
                at: self.transactions.len(),
            })
    }

    /// Next non-comment transaction, without moving.
    pub fn peek_next(&self) -> Result<&'t Transaction, TraceError> {
        let idx = self.next_index()?;
        Ok(&self.transactions[idx])
    }

    /// Next non-comment transaction, moving past it.
    ///
    /// Comments stepped over are kept until [`take_skipped`](Self::take_skipped).
    pub fn advance_next(&mut self) -> Result<&'t Transaction, TraceError> {
        let idx = self.next_index()?;
        for txn in &self.transactions[self.pos..idx] {
            if let Transaction::Comment(text) = txn {
                self.skipped.push(text.as_str());
            }
        }
        self.pos = idx + 1;
        Ok(&self.transactions[idx])
    }

    /// Comments consumed by `advance_next` since the last call.
    pub fn take_skipped(&mut self) -> Vec<&'t str> {
        std::mem::take(&mut self.skipped)
    }
}
