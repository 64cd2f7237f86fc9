use fleetcore_context::Context;
use fleetcore_errors::EngineError;
use fleetcore_errors::InvalidParameter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One `field[:asc|:desc]` entry from a list request's `sort` parameter.
#[derive(Clone, Debug)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        SortKey {
            field: field.into(),
            direction,
        }
    }

    /// Parses a single `sort` token, e.g. `"name:desc"`. Direction defaults
    /// to ascending when no suffix is given.
    pub fn parse(token: &str) -> Self {
        match token.split_once(':') {
            Some((field, "desc")) => SortKey::new(field, SortDirection::Desc),
            Some((field, _)) => SortKey::new(field, SortDirection::Asc),
            None => SortKey::new(token, SortDirection::Asc),
        }
    }
}

/// Shared shape for every `_get_all`/`_count` style query.
#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub sort_keys: Vec<String>,
    /// Id of the last row of the previous page, if any.
    pub marker: Option<String>,
    pub limit: Option<usize>,
    /// When `false`, scope results to `project`.
    pub project_safe: bool,
    pub project: Option<String>,
}

impl ListQuery {
    /// Builds a [`ListQuery`] with `project_safe`/`project` taken from the
    /// caller's [`Context`]; every other field defaults.
    ///
    /// Callers must go through this (not `Default::default()`) so project
    /// scoping in [`paginate`] actually reflects who is asking.
    pub fn scoped(context: &Context) -> Self {
        ListQuery {
            project_safe: context.project_safe(),
            project: context.project.clone(),
            ..Default::default()
        }
    }
}

/// Implemented by models that can be sorted/paginated by the Store.
///
/// `sort_value` returns a comparable string for a known field name; `None`
/// signals the field is not one the model supports, which the list
/// implementation turns into an `InvalidParameter` error.
pub trait Sortable {
    fn id(&self) -> &str;
    fn sort_value(&self, field: &str) -> Option<String>;
    fn project(&self) -> &str;
}

/// Applies `project_safe` scoping, `(sort_keys + ["id"])` stable ordering and
/// marker-based pagination to an in-memory row set.
///
/// This lives in the generic crate (not the fixture backend) so any future
/// backend can reuse the exact same ordering semantics instead of
/// reimplementing the marker contract.
pub fn paginate<T: Sortable + Clone>(mut rows: Vec<T>, query: &ListQuery) -> Result<Vec<T>, EngineError> {
    if !query.project_safe {
        if let Some(project) = &query.project {
            rows.retain(|row| row.project() == project);
        }
    }

    let mut keys: Vec<SortKey> = query
        .sort_keys
        .iter()
        .map(|token| SortKey::parse(token))
        .collect();
    keys.push(SortKey::new("id", SortDirection::Asc));

    for row in &rows {
        for key in &keys {
            if key.field != "id" && row.sort_value(&key.field).is_none() {
                return Err(InvalidParameter::new("sort", format!("unknown sort key '{}'", key.field)).into());
            }
        }
    }

    rows.sort_by(|a, b| {
        for key in &keys {
            let va = if key.field == "id" {
                a.id().to_string()
            } else {
                a.sort_value(&key.field).unwrap_or_default()
            };
            let vb = if key.field == "id" {
                b.id().to_string()
            } else {
                b.sort_value(&key.field).unwrap_or_default()
            };
            let ordering = va.cmp(&vb);
            let ordering = match key.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });

    let rows = if let Some(marker) = &query.marker {
        match rows.iter().position(|row| row.id() == marker) {
            Some(index) => rows.split_off(index + 1),
            None => rows,
        }
    } else {
        rows
    };

    let rows = match query.limit {
        Some(limit) => rows.into_iter().take(limit).collect(),
        None => rows,
    };
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Row {
        id: &'static str,
        name: &'static str,
        project: &'static str,
    }

    impl Sortable for Row {
        fn id(&self) -> &str {
            self.id
        }
        fn sort_value(&self, field: &str) -> Option<String> {
            match field {
                "name" => Some(self.name.to_string()),
                _ => None,
            }
        }
        fn project(&self) -> &str {
            self.project
        }
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { id: "b", name: "beta", project: "p1" },
            Row { id: "a", name: "alpha", project: "p1" },
            Row { id: "c", name: "gamma", project: "p2" },
        ]
    }

    #[test]
    fn sorts_by_requested_key_then_id() {
        let query = ListQuery {
            sort_keys: vec!["name".to_string()],
            project_safe: true,
            ..Default::default()
        };
        let sorted = paginate(rows(), &query).unwrap();
        let ids: Vec<&str> = sorted.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn unknown_sort_key_is_invalid_parameter() {
        let query = ListQuery {
            sort_keys: vec!["bogus".to_string()],
            project_safe: true,
            ..Default::default()
        };
        let err = paginate(rows(), &query).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter(_)));
    }

    #[test]
    fn marker_resumes_after_given_id() {
        let query = ListQuery {
            marker: Some("a".to_string()),
            project_safe: true,
            ..Default::default()
        };
        let page = paginate(rows(), &query).unwrap();
        let ids: Vec<&str> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn project_scoping_filters_rows() {
        let query = ListQuery {
            project_safe: false,
            project: Some("p1".to_string()),
            ..Default::default()
        };
        let page = paginate(rows(), &query).unwrap();
        assert_eq!(page.len(), 2);
    }
}
