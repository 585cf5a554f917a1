//! Collective operations built on the point-to-point [`Communicator`].
//!
//! Every function here must be called by all ranks of the group in the same
//! order. Exchanges are two-phase: a [`WireCount`] size message to every peer
//! on `tag`, then the payloads on `tag + 1` for the non-empty ones. All posted
//! handles are drained before returning, even when an error is reported.

use crate::algs::communicator::{CommTag, Communicator, Wait};
use crate::algs::wire::WireCount;
use crate::mesh_error::{MeshError, Stage};
use std::mem::size_of;

/// Base tags of the collective mesh operations. An operation uses
/// consecutive tags upward from its base; bases are far enough apart that
/// operations never share a tag.
pub mod tags {
    use crate::algs::communicator::CommTag;

    pub const INGEST: CommTag = CommTag::new(0x100);
    pub const MIGRATE: CommTag = CommTag::new(0x200);
    pub const REPARTITION: CommTag = CommTag::new(0x300);
    pub const OVERLAP: CommTag = CommTag::new(0x400);
    pub const VERIFY: CommTag = CommTag::new(0x500);
    pub const COUNT: CommTag = CommTag::new(0x600);
}

/// Tags consumed by one [`exchange`] call.
pub const EXCHANGE_TAGS: u16 = 4;

/// Personalized all-to-all: `sends[r]` goes to rank `r`; returns what every
/// rank sent to us, indexed by source rank.
pub fn all_to_all<C>(comm: &C, tag: CommTag, mut sends: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, MeshError>
where
    C: Communicator,
{
    let me = comm.rank();
    let size = comm.size();
    if sends.len() != size {
        return Err(MeshError::comm(
            me,
            format!("all_to_all got {} buffers for {size} ranks", sends.len()),
        ));
    }
    let mut received: Vec<Vec<u8>> = vec![Vec::new(); size];
    received[me] = std::mem::take(&mut sends[me]);
    if size == 1 {
        return Ok(received);
    }
    let peers: Vec<usize> = (0..size).filter(|&r| r != me).collect();

    // 1) sizes
    let mut size_recvs = Vec::with_capacity(peers.len());
    for &peer in &peers {
        let mut cnt = WireCount::new(0);
        let h = comm.irecv(
            peer,
            tag.as_u16(),
            bytemuck::bytes_of_mut(&mut cnt),
        );
        size_recvs.push((peer, h));
    }
    let mut pending_sends = Vec::with_capacity(peers.len());
    for &peer in &peers {
        let count = WireCount::new(sends[peer].len());
        pending_sends.push(comm.isend(peer, tag.as_u16(), bytemuck::bytes_of(&count)));
    }
    let mut incoming = vec![0usize; size];
    let mut maybe_err = None;
    for (peer, h) in size_recvs {
        match h.wait() {
            Some(data) if data.len() == size_of::<WireCount>() => {
                let cnt: WireCount = bytemuck::pod_read_unaligned(&data);
                incoming[peer] = cnt.get();
            }
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(MeshError::comm(
                    me,
                    format!(
                        "expected {} bytes for size header from rank {peer}, got {}",
                        size_of::<WireCount>(),
                        data.len()
                    ),
                ));
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(MeshError::comm(
                    me,
                    format!("failed to receive size from rank {peer}"),
                ));
            }
            _ => {}
        }
    }
    for s in pending_sends {
        let _ = s.wait();
    }

    // 2) payloads; peers already posted their sizes, so keep the protocol going
    // even after a local error to avoid leaving them blocked.
    let data_tag = tag.offset(1);
    let mut data_recvs = Vec::new();
    for &peer in &peers {
        if incoming[peer] > 0 {
            let mut buf = vec![0u8; incoming[peer]];
            data_recvs.push((peer, comm.irecv(peer, data_tag.as_u16(), &mut buf)));
        }
    }
    let mut pending_sends = Vec::new();
    for &peer in &peers {
        if !sends[peer].is_empty() {
            pending_sends.push(comm.isend(peer, data_tag.as_u16(), &sends[peer]));
        }
    }
    for (peer, h) in data_recvs {
        match h.wait() {
            Some(data) if data.len() == incoming[peer] => received[peer] = data,
            Some(data) if maybe_err.is_none() => {
                maybe_err = Some(MeshError::comm(
                    me,
                    format!(
                        "expected {} bytes from rank {peer}, got {}",
                        incoming[peer],
                        data.len()
                    ),
                ));
            }
            None if maybe_err.is_none() => {
                maybe_err = Some(MeshError::comm(
                    me,
                    format!("failed to receive payload from rank {peer}"),
                ));
            }
            _ => {}
        }
    }
    for s in pending_sends {
        let _ = s.wait();
    }

    match maybe_err {
        Some(err) => Err(err),
        None => Ok(received),
    }
}

/// Every rank receives every rank's buffer, indexed by source rank.
pub fn all_gather<C>(comm: &C, tag: CommTag, mine: Vec<u8>) -> Result<Vec<Vec<u8>>, MeshError>
where
    C: Communicator,
{
    let sends = vec![mine; comm.size()];
    all_to_all(comm, tag, sends)
}

/// `root` sends `data` to everybody; other ranks pass an empty buffer.
pub fn broadcast<C>(comm: &C, tag: CommTag, root: usize, data: Vec<u8>) -> Result<Vec<u8>, MeshError>
where
    C: Communicator,
{
    let size = comm.size();
    if root >= size {
        return Err(MeshError::comm(
            comm.rank(),
            format!("broadcast root {root} outside group of {size}"),
        ));
    }
    let sends = if comm.rank() == root {
        vec![data; size]
    } else {
        vec![Vec::new(); size]
    };
    let mut received = all_to_all(comm, tag, sends)?;
    Ok(std::mem::take(&mut received[root]))
}

/// Every rank contributes one `u64`; returns all of them by rank.
pub fn all_gather_u64<C>(comm: &C, tag: CommTag, value: u64) -> Result<Vec<u64>, MeshError>
where
    C: Communicator,
{
    let me = comm.rank();
    all_gather(comm, tag, value.to_le_bytes().to_vec())?
        .into_iter()
        .enumerate()
        .map(|(rank, bytes)| {
            let arr: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                MeshError::comm(me, format!("rank {rank} sent {} bytes, expected 8", bytes.len()))
            })?;
            Ok(u64::from_le_bytes(arr))
        })
        .collect()
}

pub fn all_reduce_sum<C>(comm: &C, tag: CommTag, value: u64) -> Result<u64, MeshError>
where
    C: Communicator,
{
    Ok(all_gather_u64(comm, tag, value)?.into_iter().sum())
}

/// Turn per-rank outcomes into one group-wide verdict.
///
/// If any rank failed, every rank returns the error of the lowest failing
/// rank, so no rank continues alone past a failed step.
pub fn agree<C, T>(comm: &C, tag: CommTag, stage: Stage, local: Result<T, MeshError>) -> Result<T, MeshError>
where
    C: Communicator,
{
    let me = comm.rank();
    let status = match &local {
        Ok(_) => Vec::new(),
        Err(e) => bincode::serialize(e).unwrap_or_else(|_| vec![0]),
    };
    let statuses = all_gather(comm, tag, status)?;
    let Some((rank, bytes)) = statuses
        .into_iter()
        .enumerate()
        .find(|(_, s)| !s.is_empty())
    else {
        return local;
    };
    let err = if rank == me {
        match local {
            Err(e) => e,
            Ok(_) => MeshError::comm(me, "local status changed during agreement"),
        }
    } else {
        bincode::deserialize::<MeshError>(&bytes).unwrap_or_else(|_| {
            MeshError::comm(rank, format!("{stage} failed with an undecodable error"))
        })
    };
    log::error!("{stage} failed on rank {rank}: {err}");
    Err(err)
}

/// [`all_to_all`] whose outcome is agreed group-wide.
///
/// Uses tags `tag ..= tag + 3`.
pub fn exchange<C>(
    comm: &C,
    tag: CommTag,
    stage: Stage,
    sends: Vec<Vec<u8>>,
) -> Result<Vec<Vec<u8>>, MeshError>
where
    C: Communicator,
{
    let received = all_to_all(comm, tag, sends);
    agree(comm, tag.offset(2), stage, received)
}
