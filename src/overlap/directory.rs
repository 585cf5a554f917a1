//! Distributed owner directory for element IDs.
//!
//! The home rank of an element ID is `id mod P`. Every rank registers the
//! elements it owns with their home ranks; afterwards any rank can ask the
//! homes who owns a given ID. No rank ever holds the whole ownership map.

use crate::algs::collective::{EXCHANGE_TAGS, agree, exchange};
use crate::algs::communicator::{CommTag, Communicator};
use crate::algs::wire::{KIND_IDS, KIND_PAIRS, decode_list, encode_list};
use crate::mesh_error::{MeshError, Stage};
use crate::topology::point::ElementId;
use std::collections::HashMap;

/// Answer for an ID nobody registered.
const NO_OWNER: u64 = u64::MAX;

/// Tags consumed by [`OwnerDirectory::build`].
pub const BUILD_TAGS: u16 = EXCHANGE_TAGS + 2;
/// Tags consumed by [`OwnerDirectory::lookup`].
pub const LOOKUP_TAGS: u16 = 3 * EXCHANGE_TAGS;

/// Owners of the element IDs homed on this rank.
#[derive(Debug, Clone)]
pub struct OwnerDirectory {
    size: usize,
    owners: HashMap<ElementId, usize>,
}

impl OwnerDirectory {
    pub fn home_of(id: ElementId, size: usize) -> usize {
        (id.get() % size.max(1) as u64) as usize
    }

    /// Register `owned` with their home ranks (collective).
    ///
    /// Fails on every rank when some element is claimed by two ranks.
    pub fn build<C, I>(comm: &C, tag: CommTag, stage: Stage, owned: I) -> Result<Self, MeshError>
    where
        C: Communicator,
        I: IntoIterator<Item = ElementId>,
    {
        let size = comm.size();
        let mut claims: Vec<Vec<u64>> = vec![Vec::new(); size];
        for id in owned {
            claims[Self::home_of(id, size)].push(id.get());
        }
        let received = exchange(comm, tag, stage, encode_nonempty(KIND_IDS, &claims))?;

        let mut owners = HashMap::new();
        let registered = record_claims(comm.rank(), &received, &mut owners);
        agree(comm, tag.offset(EXCHANGE_TAGS), stage, registered)?;
        log::debug!(
            "rank {}: owner directory holds {} entries",
            comm.rank(),
            owners.len()
        );
        Ok(Self { size, owners })
    }

    /// Owner of every ID in `ids` (collective; other ranks may ask for nothing).
    ///
    /// An ID that no rank owns is a `Communication` error on every rank.
    pub fn lookup<C>(
        &self,
        comm: &C,
        tag: CommTag,
        stage: Stage,
        ids: &[ElementId],
    ) -> Result<HashMap<ElementId, usize>, MeshError>
    where
        C: Communicator,
    {
        let me = comm.rank();
        let mut queries: Vec<Vec<u64>> = vec![Vec::new(); self.size];
        for &id in ids {
            queries[Self::home_of(id, self.size)].push(id.get());
        }
        let received = exchange(comm, tag, stage, encode_nonempty(KIND_IDS, &queries))?;

        // answer the questions addressed to us
        let answers: Result<Vec<Vec<u8>>, MeshError> = received
            .iter()
            .map(|bytes| {
                let asked = decode_list(KIND_IDS, bytes).map_err(|e| MeshError::comm(me, e))?;
                if asked.is_empty() {
                    return Ok(Vec::new());
                }
                let mut pairs = Vec::with_capacity(2 * asked.len());
                for id in asked {
                    let owner = self
                        .owners
                        .get(&ElementId::new(id))
                        .map_or(NO_OWNER, |&r| r as u64);
                    pairs.extend([id, owner]);
                }
                Ok(encode_list(KIND_PAIRS, &pairs))
            })
            .collect();
        let answers = agree(comm, tag.offset(EXCHANGE_TAGS), stage, answers)?;
        let replies = exchange(comm, tag.offset(EXCHANGE_TAGS + 2), stage, answers)?;

        let resolved = resolve_replies(me, ids, &replies);
        agree(comm, tag.offset(2 * EXCHANGE_TAGS + 2), stage, resolved)
    }

    /// Number of IDs homed here.
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }
}

fn encode_nonempty(kind: u16, lists: &[Vec<u64>]) -> Vec<Vec<u8>> {
    lists
        .iter()
        .map(|l| {
            if l.is_empty() {
                Vec::new()
            } else {
                encode_list(kind, l)
            }
        })
        .collect()
}

fn record_claims(
    me: usize,
    received: &[Vec<u8>],
    owners: &mut HashMap<ElementId, usize>,
) -> Result<(), MeshError> {
    for (src, bytes) in received.iter().enumerate() {
        for id in decode_list(KIND_IDS, bytes).map_err(|e| MeshError::comm(me, e))? {
            if let Some(prev) = owners.insert(ElementId::new(id), src) {
                return Err(MeshError::comm(
                    me,
                    format!("element {id} is claimed by ranks {prev} and {src}"),
                ));
            }
        }
    }
    Ok(())
}

fn resolve_replies(
    me: usize,
    ids: &[ElementId],
    replies: &[Vec<u8>],
) -> Result<HashMap<ElementId, usize>, MeshError> {
    let mut found = HashMap::with_capacity(ids.len());
    for bytes in replies {
        let pairs = decode_list(KIND_PAIRS, bytes).map_err(|e| MeshError::comm(me, e))?;
        if pairs.len() % 2 != 0 {
            return Err(MeshError::comm(me, "owner reply has an odd number of words"));
        }
        for pair in pairs.chunks_exact(2) {
            if pair[1] != NO_OWNER {
                found.insert(ElementId::new(pair[0]), pair[1] as usize);
            }
        }
    }
    for id in ids {
        if !found.contains_key(id) {
            return Err(MeshError::comm(me, format!("element {id} has no owner")));
        }
    }
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::{NoComm, on_ranks};

    const T: CommTag = CommTag::new(900);

    #[test]
    fn lookup_finds_remote_owners() {
        let out = on_ranks(3, |c| {
            // rank r owns 10r .. 10r+5
            let owned = (0..5).map(|i| ElementId::new(10 * c.rank() as u64 + i));
            let dir = OwnerDirectory::build(&c, T, Stage::Verify, owned).unwrap();
            let ask = [ElementId::new(3), ElementId::new(14), ElementId::new(22)];
            dir.lookup(&c, T.offset(BUILD_TAGS), Stage::Verify, &ask)
                .unwrap()
        });
        for owners in out {
            assert_eq!(owners[&ElementId::new(3)], 0);
            assert_eq!(owners[&ElementId::new(14)], 1);
            assert_eq!(owners[&ElementId::new(22)], 2);
        }
    }

    #[test]
    fn duplicate_claims_fail_everywhere() {
        let out = on_ranks(2, |c| {
            let owned = [ElementId::new(7), ElementId::new(c.rank() as u64)];
            OwnerDirectory::build(&c, T, Stage::Verify, owned).map(|_| ())
        });
        for r in out {
            match r {
                Err(MeshError::Communication { message, .. }) => {
                    assert!(message.contains("element 7"))
                }
                other => panic!("expected duplicate claim error, got {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_ids_fail_everywhere() {
        let out = on_ranks(2, |c| {
            let dir = OwnerDirectory::build(&c, T, Stage::Overlap, [ElementId::new(c.rank() as u64)])
                .unwrap();
            let ask: Vec<ElementId> = if c.rank() == 1 {
                vec![ElementId::new(99)]
            } else {
                Vec::new()
            };
            dir.lookup(&c, T.offset(BUILD_TAGS), Stage::Overlap, &ask)
        });
        assert!(out.iter().all(|r| r.is_err()));
    }

    #[test]
    fn single_rank_directory() {
        let c = NoComm;
        let dir = OwnerDirectory::build(&c, T, Stage::Verify, [ElementId::new(4)]).unwrap();
        assert_eq!(dir.len(), 1);
        let owners = dir
            .lookup(&c, T.offset(BUILD_TAGS), Stage::Verify, &[ElementId::new(4)])
            .unwrap();
        assert_eq!(owners[&ElementId::new(4)], 0);
    }
}
