pub mod claude;
pub mod gemini;
pub mod openai_compatible;

pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use openai_compatible::OpenAiCompatibleAdapter;

use reqwest::{RequestBuilder, StatusCode};

use super::probe::ProbeOutcome;

/// 探测提示词
pub(crate) const PROBE_PROMPT: &str = "Hi";

/// 响应体读取上限，探测只需要顶层字段
pub(crate) const MAX_BODY_BYTES: usize = 16 * 1024;

/// 发送请求并读取响应体，超过上限的部分丢弃
///
/// 发送或读取过程中的传输错误直接转为失败结果。
pub(crate) async fn execute(request: RequestBuilder) -> Result<(StatusCode, Vec<u8>), ProbeOutcome> {
    let mut response = request
        .send()
        .await
        .map_err(ProbeOutcome::from_transport_error)?;
    let status = response.status();

    let mut body = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(ProbeOutcome::from_transport_error)?
    {
        let remaining = MAX_BODY_BYTES - body.len();
        if chunk.len() >= remaining {
            body.extend_from_slice(&chunk[..remaining]);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok((status, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(body: Vec<u8>) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn oversized_body_is_truncated() {
        let server = serve(vec![b'a'; 256 * 1024]).await;
        let request = reqwest::Client::new().post(server.uri());

        let (status, body) = execute(request).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.len(), MAX_BODY_BYTES);
    }

    #[tokio::test]
    async fn small_body_is_read_whole() {
        let payload = br#"{"choices":[]}"#.to_vec();
        let server = serve(payload.clone()).await;
        let request = reqwest::Client::new().post(server.uri());

        let (_, body) = execute(request).await.unwrap();
        assert_eq!(body, payload);
    }
}
