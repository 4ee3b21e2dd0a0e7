//! Integer helpers shared by the optimizer and the trainer.

/// Euclidean greatest common divisor; `gcd(a, 0) == a`.
pub fn gcd(a: u32, b: u32) -> u32 {
    let (mut a, mut b) = (a, b);
    while b != 0 {
        let r = a % b;
        a = b;
        b = r;
    }
    a
}

/// GCD of a list of values. An empty list yields 1.
pub fn gcd_multiple(values: &[u32]) -> u32 {
    match values.split_first() {
        None => 1,
        Some((first, rest)) => rest.iter().fold(*first, |acc, &v| gcd(acc, v)),
    }
}

/// Rounds `quantity` to the nearest multiple of `layers` (halves round up).
/// A zero layer count leaves the quantity unchanged. When rounding up would
/// leave the `u32` range, the next lower multiple is used instead.
pub fn adjust_to_layers(quantity: u32, layers: u32) -> u32 {
    if layers == 0 {
        return quantity;
    }
    let wide = u64::from(quantity);
    let wide_layers = u64::from(layers);
    let rounded = (wide + wide_layers / 2) / wide_layers * wide_layers;
    u32::try_from(rounded).unwrap_or(quantity / layers * layers)
}

/// Relative deviation in percent between an original and an adjusted quantity.
pub fn deviation_percent(original: u32, adjusted: u32) -> f64 {
    if original == 0 {
        return 0.0;
    }
    (f64::from(adjusted) - f64::from(original)).abs() * 100.0 / f64::from(original)
}
