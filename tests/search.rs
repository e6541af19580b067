//! Search Tool Integration Tests
//!
//! Validation before network, result mapping, metadata, and call isolation.

mod common;

use common::{connection, MockTransport, TEST_KEY};
use parallel_web::transport::Auth;
use parallel_web::{ApiKey, Error, ParallelSearchTool, Processor, SearchRequest, SourcePolicy, Tool};
use serde_json::{json, Value};

fn vendor_results(count: usize) -> Value {
    let results: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "url": format!("https://news.example/{}", i),
                "title": format!("Result {}", i),
                "excerpts": [format!("Excerpt for result {}", i)],
            })
        })
        .collect();
    json!({"search_id": "search_123", "results": results})
}

#[tokio::test]
async fn test_invalid_requests_make_no_calls() {
    let mock = MockTransport::new();
    let tool = ParallelSearchTool::new(connection(&mock));

    let invalid = vec![
        SearchRequest::default(),
        SearchRequest {
            search_queries: Some(vec!["x".into()]),
            ..SearchRequest::objective("y")
        },
        SearchRequest::queries(["a", "b", "c", "d", "e", "f"]),
        SearchRequest::queries(["q".repeat(201)]),
        SearchRequest::objective("o".repeat(5001)),
        SearchRequest {
            max_results: 0,
            ..SearchRequest::objective("x")
        },
        SearchRequest {
            max_results: 41,
            ..SearchRequest::objective("x")
        },
        SearchRequest {
            max_chars_per_result: 99,
            ..SearchRequest::objective("x")
        },
    ];

    for request in invalid {
        let err = tool.search(&request).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{:?}", request);
    }
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_objective_search_returns_results() {
    let mock = MockTransport::new();
    mock.push_json(Ok(vendor_results(5)));
    let tool = ParallelSearchTool::new(connection(&mock));

    let request = SearchRequest {
        max_results: 5,
        ..SearchRequest::objective("renewable energy 2024")
    };
    let response = tool.search(&request).await.unwrap();

    assert_eq!(response.results.len(), 5);
    assert_eq!(response.search_id, "search_123");
    for result in &response.results {
        assert!(!result.url.is_empty());
        assert!(result.title.as_deref().is_some_and(|t| !t.is_empty()));
        assert!(!result.excerpts.is_empty());
    }

    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.ends_with("/v1beta/search"));
    assert_eq!(
        requests[0].auth,
        Auth::Header {
            name: "x-api-key",
            key: ApiKey::new(TEST_KEY),
        }
    );
    assert_eq!(requests[0].body["objective"], "renewable energy 2024");
    assert_eq!(requests[0].body["max_results"], 5);
    assert!(requests[0].body.get("search_queries").is_none());
}

#[tokio::test]
async fn test_processor_picks_default_timeout() {
    let mock = MockTransport::new();
    mock.push_json(Ok(vendor_results(1)));
    mock.push_json(Ok(vendor_results(1)));
    let tool = ParallelSearchTool::new(connection(&mock));

    let fast = SearchRequest::objective("fast");
    tool.search(&fast).await.unwrap();
    tool.search(&SearchRequest {
        processor: Processor::Pro,
        ..SearchRequest::objective("thorough")
    })
    .await
    .unwrap();

    let requests = mock.requests();
    assert_eq!(requests[0].timeout, Processor::Base.default_timeout());
    assert_eq!(requests[1].timeout, Processor::Pro.default_timeout());
    assert_eq!(requests[1].body["processor"], "pro");
}

#[tokio::test]
async fn test_tool_call_with_metadata() {
    let mock = MockTransport::new();
    mock.push_json(Ok(vendor_results(3)));
    let tool = ParallelSearchTool::new(connection(&mock));

    let output = tool
        .call(json!({
            "search_queries": ["solar", "wind"],
            "source_policy": {"include_domains": ["energy.gov"]},
            "include_metadata": true,
        }))
        .await
        .unwrap();

    assert_eq!(output["results"].as_array().unwrap().len(), 3);
    let metadata = &output["search_metadata"];
    assert_eq!(metadata["result_count"], 3);
    assert_eq!(metadata["query_count"], 2);
    assert_eq!(metadata["objective_provided"], false);
    assert_eq!(metadata["processor_used"], "base");
    assert_eq!(metadata["max_results_requested"], 10);
    assert_eq!(metadata["actual_results_returned"], 3);
    assert_eq!(metadata["source_policy_applied"], true);
    assert_eq!(metadata["included_domains"], json!(["energy.gov"]));
    assert!(metadata.get("excluded_domains").is_none());
    assert!(metadata["search_duration_seconds"].as_f64().unwrap() >= 0.0);
    assert!(metadata["timestamp"].is_string());

    let body = mock.last_body();
    assert_eq!(
        body["source_policy"],
        json!({"include_domains": ["energy.gov"]})
    );
    assert!(body.get("include_metadata").is_none());
}

#[tokio::test]
async fn test_tool_call_without_metadata_omits_it() {
    let mock = MockTransport::new();
    mock.push_json(Ok(vendor_results(1)));
    let tool = ParallelSearchTool::new(connection(&mock));

    let output = tool.call(json!({"objective": "x"})).await.unwrap();
    assert!(output.get("search_metadata").is_none());
}

#[tokio::test]
async fn test_bad_tool_args_are_validation_errors() {
    let mock = MockTransport::new();
    let tool = ParallelSearchTool::new(connection(&mock));

    let err = tool
        .call(json!({"objective": "x", "processor": "ultra"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(mock.calls(), 0);
}

#[tokio::test]
async fn test_calls_do_not_share_state() {
    let mock = MockTransport::new();
    mock.push_json(Ok(vendor_results(2)));
    mock.push_json(Ok(vendor_results(4)));
    let tool = ParallelSearchTool::new(connection(&mock));

    let first = tool
        .search(&SearchRequest {
            source_policy: Some(SourcePolicy {
                include_domains: vec![],
                exclude_domains: vec!["spam.example".into()],
            }),
            ..SearchRequest::objective("first")
        })
        .await
        .unwrap();
    let second_request = SearchRequest::queries(["second"]);
    let second = tool.search(&second_request).await.unwrap();

    assert_eq!(first.results.len(), 2);
    assert_eq!(second.results.len(), 4);

    let requests = mock.requests();
    assert!(requests[0].body.get("source_policy").is_some());
    assert!(requests[1].body.get("source_policy").is_none());
    assert!(requests[1].body.get("objective").is_none());
    assert_eq!(requests[1].body["search_queries"], json!(["second"]));
}

#[tokio::test]
async fn test_vendor_error_propagates() {
    let mock = MockTransport::new();
    mock.push_json(Err(Error::Api {
        status: 422,
        message: "objective too vague".into(),
    }));
    let tool = ParallelSearchTool::new(connection(&mock));

    let request = SearchRequest::objective("?");
    let err = tool.search(&request).await.unwrap_err();
    assert_eq!(err.status(), Some(422));
    assert!(!err.is_retryable());
}

#[test]
fn test_tool_spec() {
    let mock = MockTransport::new();
    let tool = ParallelSearchTool::new(connection(&mock));

    let spec = tool.spec();
    assert_eq!(spec.name, "parallel_web_search");
    assert!(spec.description.contains("Search the web"));
    assert_eq!(spec.args_schema["properties"]["max_results"]["maximum"], 40);
}
