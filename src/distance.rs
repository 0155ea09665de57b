/// 无法比较时返回的距离，表示“完全不相似”
pub const INCOMPARABLE: f64 = f64::INFINITY;

/// 计算向量 a 和 b 的欧氏距离
///
/// 长度不一致或任意一方为空时返回 [`INCOMPARABLE`] 而不是报错，
/// 这样缺失描述符的候选图片只会被排到最后。
#[inline]
pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return INCOMPARABLE;
    }
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

/// 与 [`euclidean`] 相同，但允许描述符分量缺失
#[inline]
pub fn euclidean_opt(a: Option<&[f64]>, b: Option<&[f64]>) -> f64 {
    match (a, b) {
        (Some(a), Some(b)) => euclidean(a, b),
        _ => INCOMPARABLE,
    }
}

/// 只比较前 prefix 个元素，用于批量排序时的降维
///
/// 截断后长度仍不一致时同样返回 [`INCOMPARABLE`]。
#[inline]
pub fn euclidean_prefix(a: &[f64], b: &[f64], prefix: usize) -> f64 {
    euclidean(&a[..a.len().min(prefix)], &b[..b.len().min(prefix)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_basic() {
        assert_eq!(euclidean(&[0., 0.], &[3., 4.]), 5.);
        assert_eq!(euclidean(&[1., 2., 3.], &[1., 2., 3.]), 0.);
    }

    #[test]
    fn test_euclidean_symmetric() {
        let a = [1.5, -2., 8.];
        let b = [0., 7., 3.25];
        assert_eq!(euclidean(&a, &b), euclidean(&b, &a));
        assert!(euclidean(&a, &b) >= 0.);
    }

    #[test]
    fn test_euclidean_mismatch() {
        assert_eq!(euclidean(&[1., 2.], &[1., 2., 3.]), INCOMPARABLE);
        assert_eq!(euclidean(&[], &[]), INCOMPARABLE);
        assert_eq!(euclidean(&[1.], &[]), INCOMPARABLE);
    }

    #[test]
    fn test_euclidean_opt_missing() {
        assert_eq!(euclidean_opt(None, Some(&[1.])), INCOMPARABLE);
        assert_eq!(euclidean_opt(Some(&[1.]), None), INCOMPARABLE);
        assert_eq!(euclidean_opt(Some(&[1.]), Some(&[2.])), 1.);
    }

    #[test]
    fn test_euclidean_prefix() {
        let a = [0., 0., 100.];
        let b = [3., 4., 0.];
        assert_eq!(euclidean_prefix(&a, &b, 2), 5.);
        assert_eq!(euclidean_prefix(&a, &b, 1000), euclidean(&a, &b));
        // 两边都超过前缀长度时可以比较
        assert_eq!(euclidean_prefix(&a, &b[..2], 2), 5.);
        assert_eq!(euclidean_prefix(&a, &b[..2], 3), INCOMPARABLE);
    }
}
