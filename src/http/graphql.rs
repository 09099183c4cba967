use super::{GitHubClient, GitHubError};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorItem>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GraphQlErrorItem {
    pub message: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

pub(super) fn join_messages(errors: &[GraphQlErrorItem]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// True when the document's first operation is a mutation.
pub fn is_mutation(query: &str) -> bool {
    query
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(' || c == '{')
        .next()
        .map(|kw| kw == "mutation")
        .unwrap_or(false)
}

impl GitHubClient {
    /// Run a GraphQL document. Queries are retried like REST GETs; mutations are
    /// sent once and refused outright on a read-only client.
    pub async fn graphql<V, T>(&self, query: &str, variables: &V) -> Result<T, GitHubError>
    where
        V: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mutation = is_mutation(query);
        if mutation {
            self.check_write("GraphQL mutation")?;
        }
        let body = serde_json::json!({ "query": query, "variables": variables });
        let url = self.endpoints.graphql_url.as_str();
        let resp = self
            .send("POST graphql", !mutation, || {
                self.authorized(self.http.post(url))
                    .header(ACCEPT, "application/json")
                    .json(&body)
            })
            .await?;
        let (bytes, meta) = self.finish(resp).await?;
        let parsed: GraphQlResponse<T> =
            serde_json::from_slice(&bytes).map_err(|source| GitHubError::Decode {
                response: Some(meta),
                source,
            })?;
        if let Some(errors) = parsed.errors.filter(|e| !e.is_empty()) {
            return Err(GitHubError::GraphQl(errors));
        }
        parsed.data.ok_or_else(|| {
            GitHubError::GraphQl(vec![GraphQlErrorItem {
                message: "response carried no data".into(),
                kind: None,
            }])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_mutations() {
        assert!(is_mutation("mutation($id: ID!) { x }"));
        assert!(is_mutation("  \n mutation AddComment { x }"));
        assert!(!is_mutation("query { viewer { login } }"));
        assert!(!is_mutation("{ viewer { login } }"));
        assert!(!is_mutation("query mutationLike { x }"));
    }

    #[test]
    fn joins_error_messages() {
        let errs = vec![
            GraphQlErrorItem { message: "a".into(), kind: None },
            GraphQlErrorItem { message: "b".into(), kind: Some("NOT_FOUND".into()) },
        ];
        assert_eq!(join_messages(&errs), "a; b");
    }
}
