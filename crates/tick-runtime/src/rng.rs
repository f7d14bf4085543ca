pub(crate) fn seed_from_clock() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.subsec_nanos() ^ elapsed.as_secs() as u32)
        .unwrap_or(0x5eed)
}

pub(crate) fn next_random_u32(state: &mut u32) -> u32 {
    let mut next = state.wrapping_add(0x6d2b79f5);
    *state = next;
    next = (next ^ (next >> 15)).wrapping_mul(next | 1);
    next ^= next.wrapping_add((next ^ (next >> 7)).wrapping_mul(next | 61));
    next ^ (next >> 14)
}

pub(crate) fn next_random_bounded(state: &mut u32, bound: u32) -> u32 {
    next_random_bounded_with(state, bound, next_random_u32)
}

fn next_random_bounded_with<F>(state: &mut u32, bound: u32, mut next: F) -> u32
where
    F: FnMut(&mut u32) -> u32,
{
    if bound <= 1 {
        return 0;
    }
    let threshold = (u64::from(u32::MAX) + 1) / u64::from(bound) * u64::from(bound);
    let mut candidate = next(state);
    while u64::from(candidate) >= threshold {
        candidate = next(state);
    }
    candidate % bound
}

#[cfg(test)]
mod rng_tests {
    use super::*;

    #[test]
    fn bounded_draw_retries_above_threshold() {
        let mut state = 0u32;
        let mut values = vec![u32::MAX, 42u32].into_iter();
        let result = next_random_bounded_with(&mut state, 10, |_s| {
            values.next().expect("test values should be available")
        });
        assert_eq!(result, 2);
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = 7u32;
        let mut b = 7u32;
        let first: Vec<u32> = (0..5).map(|_| next_random_bounded(&mut a, 100)).collect();
        let second: Vec<u32> = (0..5).map(|_| next_random_bounded(&mut b, 100)).collect();
        assert_eq!(first, second);
        assert!(first.iter().all(|value| *value < 100));
        assert_eq!(next_random_bounded(&mut a, 0), 0);
    }
}
