/// Operations that consume reference positions for the purpose of annotation
const REFERENCE_OPS: &[u8] = b"MDN";

/// Number of reference positions spanned by a CIGAR string
///
/// Sums the lengths of `M`, `D` and `N` operations. Every other operation (insertions,
/// soft and hard clips, padding, `=`/`X`) contributes nothing. A CIGAR that does not
/// parse, including the unavailable CIGAR `*`, spans zero positions.
#[must_use]
pub fn reference_length(cigar: &[u8]) -> u64 {
    let mut total: u64 = 0;
    let mut count: u64 = 0;
    let mut has_digits = false;
    for &c in cigar {
        if c.is_ascii_digit() {
            count = count.saturating_mul(10).saturating_add(u64::from(c - b'0'));
            has_digits = true;
            continue;
        }
        if !has_digits || (!c.is_ascii_alphabetic() && c != b'=') {
            return 0;
        }
        if REFERENCE_OPS.contains(&c) {
            total = total.saturating_add(count);
        }
        count = 0;
        has_digits = false;
    }
    if has_digits {
        // trailing length without an operation
        return 0;
    }
    total
}
