//! The evaluation dimensions and the metrics scored under each.

pub struct MetricSpec {
    pub key: &'static str,
    pub name: &'static str,
}

pub struct DimensionSpec {
    pub key: &'static str,
    pub name: &'static str,
    pub metrics: &'static [MetricSpec],
}

impl DimensionSpec {
    pub fn metric(&self, key: &str) -> Option<&'static MetricSpec> {
        self.metrics.iter().find(|m| m.key == key)
    }
}

pub const DIMENSIONS: &[DimensionSpec] = &[
    DimensionSpec {
        key: "originality",
        name: "Originality",
        metrics: &[
            MetricSpec { key: "innovation", name: "Clear contribution" },
            MetricSpec { key: "comparison", name: "Comparison with prior work" },
        ],
    },
    DimensionSpec {
        key: "depth",
        name: "Depth of insight",
        metrics: &[
            MetricSpec { key: "analysis", name: "Layers of analysis" },
            MetricSpec { key: "insight", name: "Insight" },
        ],
    },
    DimensionSpec {
        key: "logic",
        name: "Logical rigor",
        metrics: &[
            MetricSpec { key: "coherence", name: "Coherence" },
            MetricSpec { key: "structure", name: "Clear structure" },
        ],
    },
    DimensionSpec {
        key: "evidence",
        name: "Evidence",
        metrics: &[
            MetricSpec { key: "data", name: "Data support" },
            MetricSpec { key: "citation", name: "Citation support" },
        ],
    },
    DimensionSpec {
        key: "language",
        name: "Language",
        metrics: &[
            MetricSpec { key: "clarity", name: "Clarity" },
            MetricSpec { key: "accuracy", name: "Precise wording" },
        ],
    },
    DimensionSpec {
        key: "value",
        name: "Academic value",
        metrics: &[
            MetricSpec { key: "contribution", name: "Academic contribution" },
            MetricSpec { key: "application", name: "Practical value" },
        ],
    },
];

pub fn dimension(key: &str) -> Option<&'static DimensionSpec> {
    DIMENSIONS.iter().find(|d| d.key == key)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn six_dimensions_with_two_metrics_each() {
        assert_eq!(DIMENSIONS.len(), 6);
        assert!(DIMENSIONS.iter().all(|d| d.metrics.len() == 2));
        let keys: HashSet<_> = DIMENSIONS.iter().map(|d| d.key).collect();
        assert_eq!(keys.len(), 6);
    }

    #[test]
    fn metrics_resolve_only_under_their_dimension() {
        let logic = dimension("logic").unwrap();
        assert_eq!(logic.metric("coherence").unwrap().name, "Coherence");
        assert!(logic.metric("data").is_none());
        assert!(dimension("style").is_none());
    }
}
