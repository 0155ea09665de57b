use std::sync::LazyLock;
use std::time::Duration;

use prometheus::*;

static METRIC_RANK_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "im_rank_duration",
        "duration of a similarity ranking pass in seconds",
        &["mode"]
    )
    .unwrap()
});

static METRIC_RANK_CANDIDATES: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        "im_rank_candidates",
        "number of candidates scanned by a similarity ranking pass",
        &["mode"],
        exponential_buckets(10., 4., 10).unwrap()
    )
    .unwrap()
});

static METRIC_EXTRACT_FAILURE: LazyLock<IntCounter> = LazyLock::new(|| {
    register_int_counter!(
        "im_extract_failure_count",
        "count of descriptor extractions replaced by an empty descriptor"
    )
    .unwrap()
});

static METRIC_FEEDBACK_COUNT: LazyLock<IntCounterVec> = LazyLock::new(|| {
    register_int_counter_vec!(
        "im_feedback_count",
        "count of relevance feedback submissions",
        &["effect"]
    )
    .unwrap()
});

/// 记录一次排序扫描
pub fn observe_rank(mode: &str, duration: Duration, scanned: usize) {
    METRIC_RANK_DURATION.with_label_values(&[mode]).observe(duration.as_secs_f64());
    METRIC_RANK_CANDIDATES.with_label_values(&[mode]).observe(scanned as f64);
}

/// 描述符服务调用失败
pub fn inc_extract_failure() {
    METRIC_EXTRACT_FAILURE.inc();
}

/// 记录一次相关反馈，没有任何样本时记为 `none`
pub fn inc_feedback(has_samples: bool) {
    let effect = match has_samples {
        true => "applied",
        false => "none",
    };
    METRIC_FEEDBACK_COUNT.with_label_values(&[effect]).inc();
}
