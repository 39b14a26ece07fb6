//! CommKey scrambling for password-protected terminals
//!
//! A terminal with a CommKey answers `CMD_CONNECT` with `CMD_ACK_UNAUTH`; the
//! client then proves knowledge of the key by sending a scrambled value
//! derived from the password and the session id.

/// Ticks value mixed into the key; terminals accept the fixed value 50
pub const DEFAULT_TICKS: u8 = 50;

/// Scramble `password` with `session_id` into the 4-byte `CMD_AUTH` payload
///
/// # Examples
///
/// ```
/// use zkattend_gateway::zk::commkey::make_commkey;
///
/// let key = make_commkey(0, 0, 50);
/// assert_eq!(key[2], 50);
/// ```
pub fn make_commkey(password: u32, session_id: u16, ticks: u8) -> [u8; 4] {
    let key = password
        .reverse_bits()
        .wrapping_add(u32::from(session_id))
        .to_le_bytes();

    let x = [key[0] ^ b'Z', key[1] ^ b'K', key[2] ^ b'S', key[3] ^ b'O'];

    // Swap the 16-bit halves
    let swapped = [x[2], x[3], x[0], x[1]];

    [
        swapped[0] ^ ticks,
        swapped[1] ^ ticks,
        ticks,
        swapped[3] ^ ticks,
    ]
}
