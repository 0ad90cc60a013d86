use crate::model::Grade;

/// Maps the number of failed checks of a run to its grade.
///
/// Fixed policy, boundaries inclusive. Downstream alert thresholds key off
/// these exact bands.
///
/// | Failed checks | Grade     |
/// |---------------|-----------|
/// | 0             | excellent |
/// | 1 – 2         | good      |
/// | 3 – 5         | fair      |
/// | > 5           | poor      |
pub fn grade(failed: usize) -> Grade {
    match failed {
        0 => Grade::Excellent,
        1..=2 => Grade::Good,
        3..=5 => Grade::Fair,
        _ => Grade::Poor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(grade(0), Grade::Excellent);
        assert_eq!(grade(1), Grade::Good);
        assert_eq!(grade(2), Grade::Good);
        assert_eq!(grade(3), Grade::Fair);
        assert_eq!(grade(5), Grade::Fair);
        assert_eq!(grade(6), Grade::Poor);
        assert_eq!(grade(40), Grade::Poor);
    }
}
