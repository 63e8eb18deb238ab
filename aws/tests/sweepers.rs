mod common;

use aws::names;
use aws::sweep::{run_sweepers, SweepOutcome};
use mockito::{Matcher, Server};
use tfplug::Context;

fn only(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[tokio::test(flavor = "multi_thread")]
async fn osis_pipelines_are_listed_and_deleted() {
    let mut server = Server::new_async().await;

    let list = server
        .mock("GET", Matcher::Regex(r"^/2022-01-01/osis/listPipelines".into()))
        .with_header("content-type", "application/json")
        .with_body(r#"{"Pipelines":[{"PipelineName":"tf-acc-test-1"},{"PipelineName":"tf-acc-test-2"}]}"#)
        .expect(1)
        .create_async()
        .await;
    let delete_first = server
        .mock("DELETE", "/2022-01-01/osis/deletePipeline/tf-acc-test-1")
        .with_header("content-type", "application/json")
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let delete_gone = server
        .mock("DELETE", "/2022-01-01/osis/deletePipeline/tf-acc-test-2")
        .with_status(404)
        .with_header("content-type", "application/json")
        .with_header("x-amzn-errortype", "ResourceNotFoundException")
        .with_body(r#"{"message":"Pipeline tf-acc-test-2 not found"}"#)
        .expect(1)
        .create_async()
        .await;

    let client = common::client_for(&server.url(), &[names::OSIS]);
    let sweepers = client.registry().sweepers().unwrap();
    let reports = run_sweepers(&Context::new(), &sweepers, client, Some(&only("aws_osis_pipeline")))
        .await
        .unwrap();

    assert_eq!(reports.len(), 1);
    assert!(
        matches!(reports[0].outcome, SweepOutcome::Swept(2)),
        "{}",
        reports[0]
    );
    list.assert_async().await;
    delete_first.assert_async().await;
    delete_gone.assert_async().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn access_denied_skips_the_sweeper() {
    let mut server = Server::new_async().await;
    let _list = server
        .mock("GET", Matcher::Regex(r"^/2022-01-01/osis/listPipelines".into()))
        .with_status(403)
        .with_header("content-type", "application/json")
        .with_header("x-amzn-errortype", "AccessDeniedException")
        .with_body(r#"{"message":"User is not authorized to perform: osis:ListPipelines"}"#)
        .create_async()
        .await;

    let client = common::client_for(&server.url(), &[names::OSIS]);
    let sweepers = client.registry().sweepers().unwrap();
    let reports = run_sweepers(&Context::new(), &sweepers, client, Some(&only("aws_osis_pipeline")))
        .await
        .unwrap();

    assert!(matches!(reports[0].outcome, SweepOutcome::Skipped(_)), "{}", reports[0]);
    assert!(!reports[0].failed());
}

#[tokio::test(flavor = "multi_thread")]
async fn datazone_domains_follow_pagination() {
    let mut server = Server::new_async().await;

    let first_page = server
        .mock("GET", "/v2/domains")
        .match_query(Matcher::Missing)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"items":[{"id":"dzd_first","arn":"arn:aws:datazone:us-west-2:123456789012:domain/dzd_first","name":"first","managedAccountId":"123456789012","status":"AVAILABLE","createdAt":1700000000}],"nextToken":"page-2"}"#,
        )
        .expect(1)
        .create_async()
        .await;
    let second_page = server
        .mock("GET", "/v2/domains")
        .match_query(Matcher::UrlEncoded("nextToken".into(), "page-2".into()))
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"items":[{"id":"dzd_second","arn":"arn:aws:datazone:us-west-2:123456789012:domain/dzd_second","name":"second","managedAccountId":"123456789012","status":"AVAILABLE","createdAt":1700000000}]}"#,
        )
        .expect(1)
        .create_async()
        .await;
    let deletes = server
        .mock("DELETE", Matcher::Regex(r"^/v2/domains/dzd_(first|second)".into()))
        .with_status(202)
        .with_header("content-type", "application/json")
        .with_body(r#"{"status":"DELETING"}"#)
        .expect(2)
        .create_async()
        .await;

    let client = common::client_for(&server.url(), &[names::DATA_ZONE]);
    let sweepers = client.registry().sweepers().unwrap();
    let reports = run_sweepers(&Context::new(), &sweepers, client, Some(&only("aws_datazone_domain")))
        .await
        .unwrap();

    assert!(matches!(reports[0].outcome, SweepOutcome::Swept(2)), "{}", reports[0]);
    first_page.assert_async().await;
    second_page.assert_async().await;
    deletes.assert_async().await;
}
