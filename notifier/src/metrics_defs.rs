use shared::metrics_defs::{MetricDef, MetricType};

pub const NOTIFICATIONS_SENT: MetricDef = MetricDef {
    name: "notifications.sent",
    metric_type: MetricType::Counter,
    description: "Chat notifications delivered to the push gateway",
};

pub const NOTIFICATIONS_SKIPPED: MetricDef = MetricDef {
    name: "notifications.skipped",
    metric_type: MetricType::Counter,
    description: "Notification requests acknowledged without sending. Tagged with reason.",
};

pub const NOTIFICATIONS_FAILED: MetricDef = MetricDef {
    name: "notifications.failed",
    metric_type: MetricType::Counter,
    description: "Notification requests that ended in the error status",
};

pub const GATEWAY_SEND_DURATION: MetricDef = MetricDef {
    name: "gateway.send.duration",
    metric_type: MetricType::Histogram,
    description: "Push gateway send latency in seconds. Tagged with outcome.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, handler.",
};

pub const ALL_METRICS: &[MetricDef] = &[
    NOTIFICATIONS_SENT,
    NOTIFICATIONS_SKIPPED,
    NOTIFICATIONS_FAILED,
    GATEWAY_SEND_DURATION,
    REQUEST_DURATION,
];
