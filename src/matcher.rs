//! Header matching
//!
//! Pure evaluation of a page's listener rules against one outgoing request.
//! Forwarding fired matches to the store and sink is the runner's job.

use crate::config::ListenerConfig;
use crate::network::RequestSnapshot;

/// One fired listener match
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHit {
    pub listener_name: String,
    pub primary_key: String,
    pub value: String,
}

/// Evaluate every listener, in config order, against a request.
///
/// A listener fires when the request URL contains its `urlKeyword`
/// (case-sensitive) and the request carries its `headerKey` header (name
/// lookup is exact first, then lower-cased). A request may fire any number
/// of listeners; no match is not an error.
pub fn match_request(request: &RequestSnapshot, listeners: &[ListenerConfig]) -> Vec<ListenerHit> {
    let mut hits = Vec::new();

    for listener in listeners {
        if !request.url.contains(&listener.url_keyword) {
            continue;
        }

        let value = request
            .headers
            .get(&listener.header_key)
            .or_else(|| request.headers.get(&listener.header_key.to_lowercase()));

        let Some(value) = value else {
            continue;
        };

        hits.push(ListenerHit {
            listener_name: listener.name.clone(),
            primary_key: listener.primary_key.clone(),
            value: value.capture_value(),
        });
    }

    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::HeaderValue;
    use std::collections::HashMap;

    fn snapshot(url: &str, headers: &[(&str, &str)]) -> RequestSnapshot {
        RequestSnapshot {
            request_id: "1".to_string(),
            url: url.to_string(),
            method: "GET".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), HeaderValue::from(*v)))
                .collect::<HashMap<_, _>>(),
            timestamp: 0.0,
        }
    }

    fn listener(keyword: &str, header: &str, key: &str) -> ListenerConfig {
        ListenerConfig {
            id: key.to_string(),
            name: format!("{}-listener", key),
            url_keyword: keyword.to_string(),
            header_key: header.to_string(),
            primary_key: key.to_string(),
        }
    }

    #[test]
    fn fires_with_lowercased_header_name() {
        let request = snapshot(
            "https://shop.example.com/api/inventory?x=1",
            &[("x-token", "abc123")],
        );
        let listeners = vec![listener("/api/inventory", "X-Token", "shop-token")];

        let hits = match_request(&request, &listeners);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].primary_key, "shop-token");
        assert_eq!(hits[0].value, "abc123");
    }

    #[test]
    fn exact_header_name_wins_over_lowercase() {
        let request = snapshot(
            "https://shop.example.com/api/inventory",
            &[("X-Token", "exact"), ("x-token", "lower")],
        );
        let listeners = vec![listener("/api/inventory", "X-Token", "shop-token")];

        let hits = match_request(&request, &listeners);
        assert_eq!(hits[0].value, "exact");
    }

    #[test]
    fn never_fires_without_url_keyword() {
        let request = snapshot("https://shop.example.com/home", &[("X-Token", "abc123")]);
        let listeners = vec![listener("/api/inventory", "X-Token", "shop-token")];

        assert!(match_request(&request, &listeners).is_empty());
    }

    #[test]
    fn url_keyword_match_is_case_sensitive() {
        let request = snapshot("https://shop.example.com/API/inventory", &[("X-Token", "v")]);
        let listeners = vec![listener("/api/inventory", "X-Token", "shop-token")];

        assert!(match_request(&request, &listeners).is_empty());
    }

    #[test]
    fn missing_header_is_a_silent_miss() {
        let request = snapshot("https://shop.example.com/api/inventory", &[]);
        let listeners = vec![listener("/api/inventory", "X-Token", "shop-token")];

        assert!(match_request(&request, &listeners).is_empty());
    }

    #[test]
    fn one_request_can_fire_many_listeners() {
        let request = snapshot(
            "https://shop.example.com/api/inventory",
            &[("X-Token", "t"), ("X-Session", "s")],
        );
        let listeners = vec![
            listener("/api", "X-Token", "shop-token"),
            listener("inventory", "X-Session", "shop-session"),
            listener("/checkout", "X-Token", "checkout-token"),
        ];

        let hits = match_request(&request, &listeners);
        let keys: Vec<&str> = hits.iter().map(|h| h.primary_key.as_str()).collect();
        assert_eq!(keys, vec!["shop-token", "shop-session"]);
    }

    #[test]
    fn multi_valued_header_joins_with_comma() {
        let request = snapshot(
            "https://shop.example.com/api/inventory",
            &[("x-token", "a\nb")],
        );
        let listeners = vec![listener("/api", "X-Token", "shop-token")];

        let hits = match_request(&request, &listeners);
        assert_eq!(hits[0].value, "a,b");
    }

    #[test]
    fn listeners_fire_in_config_order() {
        let request = snapshot("https://shop.example.com/api", &[("A", "1"), ("B", "2")]);
        let listeners = vec![
            listener("/api", "B", "second"),
            listener("/api", "A", "first"),
        ];

        let hits = match_request(&request, &listeners);
        assert_eq!(hits[0].primary_key, "second");
        assert_eq!(hits[1].primary_key, "first");
    }
}
