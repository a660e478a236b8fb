use super::keys::is_exclusive;
use super::Context;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("context merge conflict on key `{key}`: existing `{existing}`, incoming `{incoming}`")]
pub struct MergeConflict {
    pub key: String,
    pub existing: String,
    pub incoming: String,
}

impl Context {
    /// Folds `incoming` into `self`.
    ///
    /// A differing value for a non-exclusive string key is a hard error and
    /// leaves `self` untouched. Exclusive keys take the incoming value. List
    /// values are unioned in destination order with value-level dedup.
    pub fn merge(&mut self, incoming: &Context) -> Result<(), MergeConflict> {
        for (key, value) in &incoming.string_map {
            if is_exclusive(key) {
                continue;
            }
            if let Some(existing) = self.string_map.get(key) {
                if existing != value {
                    return Err(MergeConflict {
                        key: key.clone(),
                        existing: existing.clone(),
                        incoming: value.clone(),
                    });
                }
            }
        }

        self.absorb(incoming);
        Ok(())
    }

    /// Applies a node's own output: string values replace what is there,
    /// lists are unioned as in [`Context::merge`]. Never conflicts, so a node
    /// re-executed after rollback can publish new values for its keys.
    pub fn absorb(&mut self, output: &Context) {
        for (key, value) in &output.string_map {
            self.string_map.insert(key.clone(), value.clone());
        }
        for (key, values) in &output.list_map {
            let target = self.list_map.entry(key.clone()).or_default();
            for value in values {
                if !target.contains(value) {
                    target.push(value.clone());
                }
            }
        }
    }

    pub fn merge_all<'a, I>(&mut self, upstreams: I) -> Result<(), MergeConflict>
    where
        I: IntoIterator<Item = &'a Context>,
    {
        for upstream in upstreams {
            self.merge(upstream)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::keys;

    fn with_string(key: &str, value: &str) -> Context {
        let mut context = Context::default();
        context.put(key, value);
        context
    }

    #[test]
    fn differing_non_exclusive_value_conflicts_in_both_orders() {
        let a = with_string("k", "v1");
        let b = with_string("k", "v2");

        let mut left = a.clone();
        let err = left.merge(&b).expect_err("conflict");
        assert_eq!(err.key, "k");
        assert_eq!(err.existing, "v1");
        assert_eq!(err.incoming, "v2");
        assert_eq!(left, a, "failed merge must not partially apply");

        let mut right = b.clone();
        assert!(right.merge(&a).is_err());
    }

    #[test]
    fn absorb_replaces_strings_and_unions_lists() {
        let mut own = with_string("port", "3000");
        own.put_list("hosts", ["h1"]);
        let mut output = with_string("port", "3001");
        output.put_list("hosts", ["h1", "h2"]);

        own.absorb(&output);
        assert_eq!(own.get_string("port"), Some("3001"));
        assert_eq!(own.get_list("hosts"), Some(&["h1".to_string(), "h2".to_string()][..]));
    }

    #[test]
    fn exclusive_key_takes_incoming_value() {
        let mut a = with_string(keys::LATEST_EXECUTION_START_TIME, "v1");
        let b = with_string(keys::LATEST_EXECUTION_START_TIME, "v2");

        a.merge(&b).expect("exclusive keys never conflict");
        assert_eq!(a.get_string(keys::LATEST_EXECUTION_START_TIME), Some("v2"));
    }

    #[test]
    fn equal_values_merge_cleanly() {
        let mut a = with_string("cluster", "c1");
        a.merge(&with_string("cluster", "c1")).expect("same value");
        a.merge(&with_string("zone", "z1")).expect("new key");
        assert_eq!(a.get_string("cluster"), Some("c1"));
        assert_eq!(a.get_string("zone"), Some("z1"));
    }

    #[test]
    fn list_union_is_order_independent_as_a_set() {
        let mut a = Context::default();
        a.put_list("hosts", ["h1", "h2"]);
        let mut b = Context::default();
        b.put_list("hosts", ["h2", "h3"]);
        let mut c = Context::default();
        c.put_list("hosts", ["h4", "h1"]);

        let mut abc = Context::default();
        abc.merge_all([&a, &b, &c]).expect("merge");
        let mut cba = Context::default();
        cba.merge_all([&c, &b, &a]).expect("merge");

        let mut left = abc.get_list("hosts").expect("hosts").to_vec();
        let mut right = cba.get_list("hosts").expect("hosts").to_vec();
        assert_eq!(left, vec!["h1", "h2", "h3", "h4"]);
        left.sort();
        right.sort();
        assert_eq!(left, right);
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let mut upstream = with_string("k", "v");
        upstream.put(keys::FAILURE_REASON, "boom");
        upstream.put_list("hosts", ["h1", "h2"]);

        let mut once = Context::default();
        once.merge(&upstream).expect("merge");
        let mut twice = once.clone();
        twice.merge(&upstream).expect("merge again");
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_all_stops_at_first_conflict() {
        let mut target = Context::default();
        let result = target.merge_all([
            &with_string("a", "1"),
            &with_string("a", "2"),
            &with_string("b", "3"),
        ]);
        assert!(result.is_err());
        assert_eq!(target.get_string("a"), Some("1"));
        assert_eq!(target.get_string("b"), None);
    }
}
