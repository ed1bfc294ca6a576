//! Upload/download endpoint.
//!
//! One handler serves every verb: GET streams a stored file back, POST stores
//! the raw request body, anything else gets an error envelope.

use std::io;

use actix_web::body::SizedStream;
use actix_web::http::header::{self, HeaderValue};
use actix_web::http::Method;
use actix_web::{HttpRequest, HttpResponse, web};
use futures_util::TryStreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::io::{ReaderStream, StreamReader};
use transfer_types::digest::md5_file;
use transfer_types::{CHUNK_SIZE, FILE_NAME_PARAM, RETURN_CODE_OK, UploadReceipt};

use crate::error::TransferError;
use crate::locks::lock_key;
use crate::pipe::{PipeOutcome, pipe};
use crate::state::AppState;

#[utoipa::path(
    method(get, post),
    path = "/",
    params(
        ("fileName" = Option<String>, Query, description = "Name of the stored file")
    ),
    request_body(
        content = Vec<u8>,
        content_type = "application/octet-stream",
        description = "Raw file bytes (POST only)"
    ),
    responses(
        (status = 200, description = "GET: file bytes as an attachment. POST: upload receipt. Validation failures: error envelope.", body = transfer_types::UploadReceipt),
        (status = 500, description = "Upload could not be stored", body = transfer_types::ErrorEnvelope)
    )
)]
/// Dispatch a transfer request on its HTTP verb.
pub async fn transfer(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Payload,
) -> HttpResponse {
    let file_name = file_name_param(req.query_string());

    let result = match *req.method() {
        Method::GET => download(&state, file_name).await,
        Method::POST => upload(&state, file_name, payload).await,
        _ => Err(TransferError::UnsupportedVerb(req.method().clone())),
    };

    result.unwrap_or_else(|err| {
        tracing::debug!(method = %req.method(), error = %err, "transfer rejected");
        err.into_response()
    })
}

/// Non-empty `fileName` from a raw query string; the last occurrence wins.
pub(crate) fn file_name_param(query: &str) -> Option<String> {
    let pairs = web::Query::<Vec<(String, String)>>::from_query(query).ok()?;
    pairs
        .into_inner()
        .into_iter()
        .filter(|(key, _)| key == FILE_NAME_PARAM)
        .map(|(_, value)| value)
        .last()
        .filter(|name| !name.is_empty())
}

async fn download(
    state: &AppState,
    file_name: Option<String>,
) -> Result<HttpResponse, TransferError> {
    let file_name = file_name.ok_or(TransferError::MissingFileName)?;
    let path = state.store.resolve(&file_name)?;

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(TransferError::NotFound),
        Err(e) => return Err(e.into()),
    };
    let meta = file.metadata().await?;
    if !meta.is_file() {
        return Err(TransferError::NotFound);
    }
    let len = meta.len();
    tracing::info!(file_name = %file_name, bytes = len, "download started");

    let logged_name = file_name.clone();
    let stream = ReaderStream::with_capacity(file, CHUNK_SIZE).inspect_err(move |err| {
        tracing::warn!(file_name = %logged_name, error = %err, "download interrupted");
    });

    let mut resp = HttpResponse::Ok();
    resp.insert_header((header::CONTENT_TYPE, "text/plain; charset=utf-8"));
    match HeaderValue::from_bytes(format!("attachment; filename={file_name}").as_bytes()) {
        Ok(value) => {
            resp.insert_header((header::CONTENT_DISPOSITION, value));
        }
        Err(_) => {
            tracing::warn!(file_name = ?file_name, "file name not valid in a header; omitting Content-Disposition");
        }
    }
    Ok(resp.body(SizedStream::new(len, stream)))
}

async fn upload(
    state: &AppState,
    file_name: Option<String>,
    payload: web::Payload,
) -> Result<HttpResponse, TransferError> {
    let file_name = file_name.ok_or(TransferError::MissingFileName)?;
    let path = state.store.resolve(&file_name)?;

    let _guard = state.write_guard(&lock_key(&path)).await;
    let mut file = tokio::fs::File::create(&path).await?;
    let body = StreamReader::new(payload.map_err(|err| io::Error::other(err.to_string())));
    let mut body = std::pin::pin!(body);

    let outcome = pipe(&mut body, &mut file).await;
    let received = outcome.bytes();
    if let PipeOutcome::Interrupted { bytes, error } = outcome {
        // Keep whatever arrived; the partial file stays on disk.
        if let Err(err) = file.flush().await {
            tracing::debug!(file_name = %file_name, error = %err, "flush of partial upload failed");
        }
        tracing::warn!(
            file_name = %file_name,
            bytes,
            error = %error,
            "upload interrupted"
        );
        return Err(TransferError::Interrupted {
            bytes,
            source: error,
        });
    }
    drop(file);

    let digest_path = path.clone();
    let digest = web::block(move || md5_file(&digest_path))
        .await
        .map_err(|err| TransferError::Io(io::Error::other(err.to_string())))??;

    tracing::info!(
        file_name = %file_name,
        received,
        file_size = digest.size,
        file_hash = %digest.hex,
        "upload stored"
    );

    Ok(HttpResponse::Ok().json(UploadReceipt {
        return_code: RETURN_CODE_OK,
        file_size: digest.size,
        file_hash: digest.hex,
        file_name,
    }))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::pin::Pin;

    use actix_web::dev::Payload;
    use actix_web::error::PayloadError;
    use actix_web::http::StatusCode;
    use actix_web::web::Bytes;
    use actix_web::{App, test};
    use futures_util::Stream;
    use transfer_types::digest::md5_hex;
    use transfer_types::{ErrorEnvelope, UnsupportedVerbEnvelope};

    use super::*;
    use crate::store::UploadStore;

    fn temp_root(tag: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "transfer-server-{tag}-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&root).expect("create temp dir");
        root
    }

    fn make_state(root: &std::path::Path, strict: bool) -> web::Data<AppState> {
        web::Data::new(AppState::new(UploadStore::new(root, strict), true))
    }

    macro_rules! init_app {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .default_service(web::to(transfer)),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn upload_then_download_round_trips() {
        let root = temp_root("round-trip");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let data: Vec<u8> = (0..(CHUNK_SIZE * 2 + 123)).map(|i| (i * 31 % 256) as u8).collect();
        let req = test::TestRequest::post()
            .uri("/?fileName=blob.bin")
            .set_payload(data.clone())
            .to_request();
        let receipt: UploadReceipt = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt.return_code, 0);
        assert_eq!(receipt.file_size, data.len() as u64);
        assert_eq!(receipt.file_hash, md5_hex(&data));
        assert_eq!(receipt.file_name, "blob.bin");

        let stored = std::fs::read(root.join("blob.bin")).unwrap();
        assert_eq!(md5_hex(&stored), receipt.file_hash);

        let req = test::TestRequest::get().uri("/?fileName=blob.bin").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(
            resp.headers().get(header::CONTENT_DISPOSITION).unwrap(),
            "attachment; filename=blob.bin"
        );
        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), data.as_slice());
    }

    #[actix_web::test]
    async fn empty_upload_stores_zero_length_file() {
        let root = temp_root("empty");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let req = test::TestRequest::post().uri("/?fileName=empty.txt").to_request();
        let receipt: UploadReceipt = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt.file_size, 0);
        assert_eq!(receipt.file_hash, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(std::fs::metadata(root.join("empty.txt")).unwrap().len(), 0);
    }

    #[actix_web::test]
    async fn reupload_overwrites_previous_content() {
        let root = temp_root("overwrite");
        let state = make_state(&root, false);
        let app = init_app!(state);

        for payload in [&b"first version, longer"[..], &b"second"[..]] {
            let req = test::TestRequest::post()
                .uri("/?fileName=doc.txt")
                .set_payload(payload.to_vec())
                .to_request();
            let receipt: UploadReceipt = test::call_and_read_body_json(&app, req).await;
            assert_eq!(receipt.file_size, payload.len() as u64);
        }

        let req = test::TestRequest::get().uri("/?fileName=doc.txt").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body.as_ref(), b"second");
    }

    #[actix_web::test]
    async fn missing_file_name_is_rejected_for_get_and_post() {
        let root = temp_root("missing-name");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let expected = ErrorEnvelope::new("file name required");
        for req in [
            test::TestRequest::get().uri("/").to_request(),
            test::TestRequest::get().uri("/?fileName=").to_request(),
            test::TestRequest::post().uri("/").set_payload("data").to_request(),
            test::TestRequest::post().uri("/?other=1").to_request(),
        ] {
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(
                resp.headers().get(header::CONTENT_TYPE).unwrap(),
                "application/json"
            );
            let body: ErrorEnvelope = test::read_body_json(resp).await;
            assert_eq!(body, expected);
        }
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }

    #[actix_web::test]
    async fn download_of_unknown_file_reports_missing() {
        let root = temp_root("not-found");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let req = test::TestRequest::get().uri("/?fileName=nope.bin").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        assert_eq!(
            body.as_ref(),
            br#"{"errorCode":-1,"errorMessage":"file does not exist"}"#
        );
    }

    #[actix_web::test]
    async fn download_of_directory_reports_missing() {
        let root = temp_root("dir-target");
        std::fs::create_dir(root.join("sub")).unwrap();
        let state = make_state(&root, false);
        let app = init_app!(state);

        let req = test::TestRequest::get().uri("/?fileName=sub").to_request();
        let body: ErrorEnvelope = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.error_message, "file does not exist");
    }

    #[actix_web::test]
    async fn unsupported_verbs_get_an_error_envelope() {
        let root = temp_root("verbs");
        let state = make_state(&root, false);
        let app = init_app!(state);

        for method in [Method::DELETE, Method::PUT, Method::PATCH] {
            let req = test::TestRequest::default()
                .method(method.clone())
                .uri("/?fileName=x")
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let body: UnsupportedVerbEnvelope = test::read_body_json(resp).await;
            assert_eq!(
                body.error,
                format!("Unexpected HTTP request verb: {}", method.as_str())
            );
        }
    }

    #[actix_web::test]
    async fn any_path_reaches_the_endpoint() {
        let root = temp_root("any-path");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/server.php?fileName=p.txt")
            .set_payload("php-compatible")
            .to_request();
        let receipt: UploadReceipt = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt.file_name, "p.txt");

        let req = test::TestRequest::get().uri("/any/where?fileName=p.txt").to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body.as_ref(), b"php-compatible");
    }

    #[actix_web::test]
    async fn percent_encoded_names_are_decoded() {
        let root = temp_root("encoded");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/?fileName=my%20file.txt")
            .set_payload("x")
            .to_request();
        let receipt: UploadReceipt = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt.file_name, "my file.txt");
        assert!(root.join("my file.txt").exists());
    }

    #[actix_web::test]
    async fn strict_names_reject_traversal() {
        let root = temp_root("strict");
        let state = make_state(&root, true);
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/?fileName=..%2Fescape.txt")
            .set_payload("x")
            .to_request();
        let body: ErrorEnvelope = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.error_message, "invalid file name");
        assert!(!root.parent().unwrap().join("escape.txt").exists());
    }

    #[actix_web::test]
    async fn lenient_names_follow_nested_paths() {
        let root = temp_root("lenient");
        std::fs::create_dir(root.join("nested")).unwrap();
        let state = make_state(&root, false);
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/?fileName=nested%2Finner.txt")
            .set_payload("deep")
            .to_request();
        let receipt: UploadReceipt = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt.file_name, "nested/inner.txt");
        assert_eq!(std::fs::read(root.join("nested").join("inner.txt")).unwrap(), b"deep");
    }

    #[actix_web::test]
    async fn upload_into_missing_directory_is_a_server_error() {
        let root = temp_root("no-dir");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/?fileName=absent%2Ffile.txt")
            .set_payload("x")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorEnvelope = test::read_body_json(resp).await;
        assert_eq!(body.error_code, -1);
    }

    #[actix_web::test]
    async fn header_unsafe_name_still_downloads() {
        let root = temp_root("header-unsafe");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/?fileName=a%0Ab.txt")
            .set_payload("line\nbreak")
            .to_request();
        let receipt: UploadReceipt = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt.file_name, "a\nb.txt");

        let req = test::TestRequest::get().uri("/?fileName=a%0Ab.txt").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.headers().get(header::CONTENT_DISPOSITION).is_none());
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), b"line\nbreak");
    }

    #[actix_web::test]
    async fn non_ascii_name_keeps_attachment_header() {
        let root = temp_root("utf8-name");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/?fileName=caf%C3%A9.txt")
            .set_payload("x")
            .to_request();
        let receipt: UploadReceipt = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt.file_name, "caf\u{e9}.txt");

        let req = test::TestRequest::get().uri("/?fileName=caf%C3%A9.txt").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_DISPOSITION).unwrap().as_bytes(),
            "attachment; filename=caf\u{e9}.txt".as_bytes()
        );
    }

    #[actix_web::test]
    async fn last_file_name_wins() {
        assert_eq!(
            file_name_param("fileName=a.txt&fileName=b.txt").as_deref(),
            Some("b.txt")
        );
        assert_eq!(file_name_param("x=1&fileName=c.txt&y=2").as_deref(), Some("c.txt"));
        assert_eq!(file_name_param("fileName=a.txt&fileName="), None);
        assert_eq!(file_name_param("filename=a.txt"), None);
        assert_eq!(file_name_param(""), None);
    }

    #[actix_web::test]
    async fn repeated_file_name_uses_last_value() {
        let root = temp_root("repeated");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let req = test::TestRequest::post()
            .uri("/?fileName=a.txt&fileName=b.txt")
            .set_payload("second wins")
            .to_request();
        let receipt: UploadReceipt = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt.file_name, "b.txt");
        assert!(root.join("b.txt").exists());
        assert!(!root.join("a.txt").exists());
    }

    #[actix_web::test]
    async fn broken_request_body_reports_interrupted_upload() {
        let root = temp_root("interrupted");
        let state = make_state(&root, false);
        let app = init_app!(state);

        let chunks: Vec<Result<Bytes, PayloadError>> = vec![
            Ok(Bytes::from_static(b"12345")),
            Err(PayloadError::Incomplete(None)),
        ];
        let stream: Pin<Box<dyn Stream<Item = Result<Bytes, PayloadError>>>> =
            Box::pin(futures_util::stream::iter(chunks));
        let (req, _) = test::TestRequest::post()
            .uri("/?fileName=partial.bin")
            .to_request()
            .replace_payload(Payload::from(stream));

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: ErrorEnvelope = test::read_body_json(resp).await;
        assert_eq!(body, ErrorEnvelope::new("upload interrupted after 5 bytes"));
        assert_eq!(std::fs::read(root.join("partial.bin")).unwrap(), b"12345");
    }
}
