//! Comparisons on the circle of 32-bit sequence numbers.

/// a < b under modular arithmetic, i.e. `b` lies less than half the sequence
/// space ahead of `a`
pub fn mod_lt(a: u32, b: u32) -> bool {
    let distance = b.wrapping_sub(a);
    distance != 0 && distance < 1 << 31
}

/// a <= b under modular arithmetic
pub fn mod_leq(a: u32, b: u32) -> bool {
    a == b || mod_lt(a, b)
}
