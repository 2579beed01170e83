//! Offline scan for broken registry invariants.
//!
//! Checks every thread for: exactly two memberships, on two distinct users,
//! both present in the directory, and no other thread for the same pair.

use crate::core::error::DmregError;
use crate::core::store::{PairKey, ThreadId, ThreadStore};
use rustc_hash::FxHashMap;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    MembershipCount,
    SelfPair,
    DuplicatePair,
    DanglingUser,
}

#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub thread_id: ThreadId,
    pub kind: ViolationKind,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct IntegrityReport {
    pub threads_scanned: usize,
    pub violations: Vec<Violation>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    fn push(&mut self, thread_id: &ThreadId, kind: ViolationKind, detail: String) {
        tracing::error!(thread = %thread_id, kind = ?kind, "{detail}");
        self.violations.push(Violation {
            thread_id: thread_id.clone(),
            kind,
            detail,
        });
    }
}

pub fn audit_integrity<S: ThreadStore + ?Sized>(store: &S) -> Result<IntegrityReport, DmregError> {
    let mut report = IntegrityReport::default();
    let mut seen_pairs: FxHashMap<PairKey, ThreadId> = FxHashMap::default();

    for thread in store.all_threads()? {
        report.threads_scanned += 1;
        let members = store.memberships_of_thread(&thread.id)?;

        for m in &members {
            if store.user(&m.user_id)?.is_none() {
                report.push(
                    &thread.id,
                    ViolationKind::DanglingUser,
                    format!("member {} is not in the user directory", m.user_id),
                );
            }
        }

        if members.len() != 2 {
            report.push(
                &thread.id,
                ViolationKind::MembershipCount,
                format!("{} memberships, expected 2", members.len()),
            );
            continue;
        }

        let pair = match PairKey::new(&members[0].user_id, &members[1].user_id) {
            Ok(pair) => pair,
            Err(_) => {
                report.push(
                    &thread.id,
                    ViolationKind::SelfPair,
                    format!("both memberships belong to {}", members[0].user_id),
                );
                continue;
            }
        };

        if let Some(first) = seen_pairs.get(&pair) {
            report.push(
                &thread.id,
                ViolationKind::DuplicatePair,
                format!("pair {pair} already has thread {first}"),
            );
        } else {
            seen_pairs.insert(pair, thread.id.clone());
        }
    }

    Ok(report)
}
