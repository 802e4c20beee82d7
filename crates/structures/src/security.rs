use crate::abi::Endian;

/// Bytes per group ID in the guest wire form.
pub const GID_WIRE_SIZE: usize = 4;

/// Largest supplementary-group list the guest kernel contract admits.
pub const NGROUPS_MAX: usize = 1023;

/// Longest login name the guest accepts, terminator included.
pub const MAXLOGNAME: usize = 33;

/// Encodes a host group list into guest wire form, index-for-index.
///
/// `out` must hold at least `gids.len() * GID_WIRE_SIZE` bytes.
pub fn gids_to_guest(gids: &[libc::gid_t], out: &mut [u8], endian: Endian) {
    for (i, gid) in gids.iter().enumerate() {
        out[i * GID_WIRE_SIZE..(i + 1) * GID_WIRE_SIZE]
            .copy_from_slice(&endian.encode_u32(*gid as u32));
    }
}

/// Decodes a guest wire-form group list into host group IDs, index-for-index.
///
/// Trailing bytes that do not make up a whole element are ignored.
pub fn gids_from_guest(b: &[u8], endian: Endian) -> Vec<libc::gid_t> {
    b.chunks_exact(GID_WIRE_SIZE)
        .map(|chunk| {
            let mut buf = [0; GID_WIRE_SIZE];
            buf.copy_from_slice(chunk);
            endian.decode_u32(buf) as libc::gid_t
        })
        .collect()
}
