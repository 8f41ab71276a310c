//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as missing clusters, empty routes, unknown source
//! clusters, over-deep match fields, malformed topic headers and
//! colliding route identifiers. Returns every [`ValidationError`] found,
//! not just the first.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use super::model::{Config, Route, TlsConfig};
use crate::engine::fields::validate_field_path;
use crate::error::ValidationError;

const ROOT: &str = "(root)";

fn validate_tls(scope: &str, field: &str, tls: Option<&TlsConfig>, errors: &mut Vec<ValidationError>) {
    let Some(tls) = tls else {
        return;
    };
    match (&tls.cert_file, &tls.key_file) {
        (Some(_), None) => errors.push(ValidationError::new(
            scope,
            format!("{field}.key_file"),
            "key_file required when cert_file is set",
        )),
        (None, Some(_)) => errors.push(ValidationError::new(
            scope,
            format!("{field}.cert_file"),
            "cert_file required when key_file is set",
        )),
        _ => {}
    }
}

fn validate_brokers(scope: &str, field: &str, brokers: &[String], errors: &mut Vec<ValidationError>) {
    if brokers.is_empty() {
        errors.push(ValidationError::new(
            scope,
            format!("{field}.brokers"),
            "brokers cannot be empty",
        ));
    } else if brokers.iter().any(|b| b.trim().is_empty()) {
        errors.push(ValidationError::new(
            scope,
            format!("{field}.brokers"),
            "broker address cannot be blank",
        ));
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.client_id.is_empty() {
        errors.push(ValidationError::new(ROOT, "client_id", "client_id is required"));
    }
    if config.reference_group_id.is_empty() {
        errors.push(ValidationError::new(
            ROOT,
            "reference_group_id",
            "reference_group_id is required",
        ));
    }

    validate_brokers(ROOT, "bridge_cluster", &config.bridge_cluster.brokers, &mut errors);
    validate_tls(ROOT, "bridge_cluster.tls", config.bridge_cluster.tls.as_ref(), &mut errors);

    if config.source_cluster.is_none() && config.source_clusters.is_empty() {
        errors.push(
            ValidationError::new(ROOT, "source_clusters", "no source cluster configured")
                .with_suggestion("add `source_cluster` or a `source_clusters` list"),
        );
    } else if config.source_cluster.is_some() && !config.source_clusters.is_empty() {
        errors.push(
            ValidationError::new(
                ROOT,
                "source_cluster",
                "source_cluster and source_clusters are mutually exclusive",
            )
            .with_suggestion("move the single cluster into the `source_clusters` list"),
        );
    }

    let mut cluster_names = HashSet::new();
    for cluster in config.all_source_clusters() {
        let scope = format!("source cluster {}", cluster.name);
        if cluster.name.is_empty() {
            errors.push(ValidationError::new(&scope, "name", "cluster name is required"));
        }
        if !cluster_names.insert(cluster.name.clone()) {
            errors.push(ValidationError::new(&scope, "name", "duplicate source cluster name"));
        }
        validate_brokers(&scope, "source_cluster", &cluster.brokers, &mut errors);
        validate_tls(&scope, "tls", cluster.tls.as_ref(), &mut errors);
        if cluster.source_group_id.is_empty() {
            errors.push(ValidationError::new(
                &scope,
                "source_group_id",
                "source_group_id is required",
            ));
        }
    }

    if config.admin.enabled && config.admin.listen_addr.parse::<SocketAddr>().is_err() {
        let mut err = ValidationError::new(
            ROOT,
            "admin.listen_addr",
            format!("'{}' is not a valid socket address", config.admin.listen_addr),
        );
        if config.admin.listen_addr.starts_with(':') {
            err = err.with_suggestion(format!("did you mean '0.0.0.0{}'?", config.admin.listen_addr));
        }
        errors.push(err);
    }

    if config.storage.flush_interval_secs == 0 {
        errors.push(ValidationError::new(
            ROOT,
            "storage.flush_interval_secs",
            "flush interval must be greater than zero",
        ));
    }

    if config.routes.is_empty() {
        errors.push(ValidationError::new(
            ROOT,
            "routes",
            "at least one route must be defined",
        ));
        return Err(errors);
    }

    let mut seen_ids: HashMap<String, usize> = HashMap::new();
    for (i, route) in config.routes.iter().enumerate() {
        let scope = route_scope(i, route);
        validate_route(config, &scope, route, &mut errors);

        let id = route.id();
        if let Some(first) = seen_ids.insert(id.clone(), i) {
            errors.push(
                ValidationError::new(
                    &scope,
                    "name",
                    format!("route id '{id}' collides with routes[{first}]"),
                )
                .with_suggestion("give one of the routes a distinct `name`"),
            );
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn route_scope(index: usize, route: &Route) -> String {
    let name = route.display_name();
    if name.is_empty() {
        format!("routes[{index}]")
    } else {
        format!("route {name}")
    }
}

fn validate_route(config: &Config, scope: &str, route: &Route, errors: &mut Vec<ValidationError>) {
    let topics = route.source_topics();
    if topics.is_empty() {
        errors.push(
            ValidationError::new(scope, "source_topics", "source_topics cannot be empty")
                .with_suggestion("set `source_topic` or `source_topics`"),
        );
    } else if topics.iter().any(String::is_empty) {
        errors.push(ValidationError::new(scope, "source_topics", "source topic cannot be blank"));
    }

    if route.destination_topic.is_empty() {
        errors.push(ValidationError::new(
            scope,
            "destination_topic",
            "destination_topic is required",
        ));
    }

    let has_clusters = config.source_cluster.is_some() || !config.source_clusters.is_empty();
    if has_clusters && config.source_cluster_for(route).is_none() {
        let message = route.source_cluster.as_ref().map_or_else(
            || "source_cluster is required when several source clusters are configured".to_string(),
            |name| format!("unknown source cluster '{name}'"),
        );
        errors.push(ValidationError::new(scope, "source_cluster", message));
    }

    if route.reference_feeds.is_empty() {
        errors.push(ValidationError::new(
            scope,
            "reference_feeds",
            "reference_feeds cannot be empty",
        ));
    }

    for (fi, feed) in route.reference_feeds.iter().enumerate() {
        if feed.topic.is_empty() {
            errors.push(ValidationError::new(
                scope,
                format!("reference_feeds[{fi}].topic"),
                "reference feed topic is required",
            ));
        }
        if feed.match_fields.is_empty() {
            errors.push(ValidationError::new(
                scope,
                format!("reference_feeds[{fi}].match_fields"),
                format!("reference feed {} match_fields cannot be empty", feed.display_name()),
            ));
        }
        for field in &feed.match_fields {
            if let Err(msg) = validate_field_path(field) {
                errors.push(ValidationError::new(
                    scope,
                    format!("reference_feeds[{fi}].match_fields"),
                    msg,
                ));
            }
        }
        for header in &feed.topic_headers {
            if !matches!(header.split_once('='), Some((key, _)) if !key.is_empty()) {
                errors.push(
                    ValidationError::new(
                        scope,
                        format!("reference_feeds[{fi}].topic_headers"),
                        format!("invalid topic header '{header}'"),
                    )
                    .with_suggestion("expected key=value"),
                );
            }
        }
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!(
        "  {} routes, {} reference feeds\n",
        config.routes.len(),
        config.total_feeds()
    )];

    for route in &config.routes {
        let cluster = config
            .source_cluster_for(route)
            .map_or_else(|| "?".to_string(), |c| c.name);
        lines.push(format!(
            "  {}  -> {} (id: {})",
            route.display_name(),
            route.destination_topic,
            route.id(),
        ));
        lines.push(format!(
            "    sources:    {} [{}]",
            route.source_topics().join(", "),
            cluster
        ));
        for feed in &route.reference_feeds {
            lines.push(format!(
                "    reference:  {} ({})",
                feed.topic,
                feed.match_fields.join(", ")
            ));
        }
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
