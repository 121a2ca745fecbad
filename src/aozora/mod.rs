//! Aozora Bunko loader.
//!
//! Resolves a work's ZIP archive from its library card, extracts the
//! Shift_JIS text member and normalizes its markup. All I/O is blocking and
//! sequential: one request for the card, one for the archive.

pub mod archive;
pub mod card;

pub use archive::{ArchiveEntry, Decoded, decode_shift_jis, extract_text_entry};
pub use card::{ArchiveKind, ArchiveLink, Card, card_url, parse_card};

use crate::config::{AozoraConfig, Config};
use crate::error::LoaderError;
use crate::normalize::{TextMode, normalize};
use crate::utils::check_response_status;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Identifies a work in the Aozora Bunko catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkId {
    author_id: u32,
    work_id: u32,
}

impl WorkId {
    /// Creates a work identifier; both ids must be positive.
    pub fn new(author_id: u32, work_id: u32) -> Result<Self, LoaderError> {
        if author_id == 0 {
            return Err(LoaderError::InvalidIdentifier(
                "author_id must be positive".to_string(),
            ));
        }
        if work_id == 0 {
            return Err(LoaderError::InvalidIdentifier(
                "work_id must be positive".to_string(),
            ));
        }
        Ok(Self { author_id, work_id })
    }

    pub fn author_id(&self) -> u32 {
        self.author_id
    }

    pub fn work_id(&self) -> u32 {
        self.work_id
    }
}

/// Transport used to download card pages and archives.
pub trait Fetch {
    /// Downloads the body at `url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoaderError>;
}

impl<T: Fetch + ?Sized> Fetch for &T {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoaderError> {
        (**self).fetch(url)
    }
}

/// Common HTTP client configuration for the loader.
pub fn create_http_client(
    config: &AozoraConfig,
) -> Result<reqwest::blocking::Client, reqwest::Error> {
    reqwest::blocking::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.timeout_sec))
        .build()
}

/// Blocking HTTP transport.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with the given configuration.
    pub fn new(config: &AozoraConfig) -> Result<Self, LoaderError> {
        Ok(Self::from_client(create_http_client(config)?))
    }

    /// Wraps an already configured client.
    pub fn from_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, LoaderError> {
        debug!(url, "GET");
        let response = check_response_status(self.client.get(url).send()?)?;
        Ok(response.bytes()?.to_vec())
    }
}

/// Card pages already downloaded, keyed by URL.
///
/// Owned by the caller and passed to [`AozoraLoader::load_with_cache`];
/// the loader keeps no state between calls.
#[derive(Debug, Clone, Default)]
pub struct CardCache {
    pages: HashMap<String, String>,
}

impl CardCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<&str> {
        self.pages.get(url).map(String::as_str)
    }

    pub fn insert(&mut self, url: impl Into<String>, page: impl Into<String>) {
        self.pages.insert(url.into(), page.into());
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
    }
}

/// Loads and cleans texts from Aozora Bunko.
pub struct AozoraLoader<F: Fetch> {
    fetcher: F,
    config: AozoraConfig,
}

impl AozoraLoader<HttpFetcher> {
    /// Creates a loader using HTTP and the given configuration.
    pub fn with_http(config: AozoraConfig) -> Result<Self, LoaderError> {
        let fetcher = HttpFetcher::new(&config)?;
        Self::new(fetcher, config)
    }
}

impl<F: Fetch> AozoraLoader<F> {
    /// Creates a loader; the configuration is validated first.
    pub fn new(fetcher: F, config: AozoraConfig) -> Result<Self, LoaderError> {
        config.validate()?;
        Ok(Self { fetcher, config })
    }

    /// Returns the card page URL of a work.
    pub fn card_url(&self, work: WorkId) -> Result<String, LoaderError> {
        card_url(&self.config.base_url, work)
    }

    /// Finds the archive to download for a work.
    ///
    /// The card page is taken from `cache` when present and stored there
    /// after a download.
    pub fn resolve(&self, work: WorkId, cache: &mut CardCache) -> Result<ArchiveLink, LoaderError> {
        let url = self.card_url(work)?;

        let page = match cache.get(&url) {
            Some(page) => {
                debug!(card_url = %url, "Using cached library card");
                page.to_string()
            }
            None => {
                let bytes = self.fetcher.fetch(&url)?;
                let page = String::from_utf8_lossy(&bytes).into_owned();
                cache.insert(url.clone(), page.clone());
                page
            }
        };

        let card = parse_card(&page, &url)?;
        card.archive_for(work.work_id())
            .cloned()
            .ok_or(LoaderError::Resolution {
                card_url: url,
                work_id: work.work_id(),
            })
    }

    /// Downloads an archive and decodes its text member.
    pub fn fetch_archive(&self, archive: &ArchiveLink) -> Result<String, LoaderError> {
        let zip_bytes = self.fetcher.fetch(&archive.url)?;
        let entry = extract_text_entry(&zip_bytes, &archive.file_name)?;
        let decoded = decode_shift_jis(&entry.bytes)?;
        Ok(decoded.text)
    }

    /// Loads a work without a card cache.
    pub fn load(&self, work: WorkId, mode: TextMode) -> Result<String, LoaderError> {
        self.load_with_cache(work, mode, &mut CardCache::new())
    }

    /// Loads a work, reusing card pages from `cache`.
    pub fn load_with_cache(
        &self,
        work: WorkId,
        mode: TextMode,
        cache: &mut CardCache,
    ) -> Result<String, LoaderError> {
        let archive = self.resolve(work, cache)?;
        info!(
            author_id = work.author_id(),
            work_id = work.work_id(),
            archive = %archive.file_name,
            "Loading work"
        );

        let text = self.fetch_archive(&archive)?;
        Ok(normalize(&text, mode))
    }
}

/// Downloads a work from Aozora Bunko (GitHub mirror).
///
/// Uses the configuration file from [`Config::load`], created with defaults
/// on first use; `raw` keeps the original markup.
///
/// ```no_run
/// // author 35, work 1567: "Run, Melos!"
/// let text = shikaku::load_aozorabunko(35, 1567, false)?;
/// # Ok::<(), shikaku::LoaderError>(())
/// ```
pub fn load_aozorabunko(author_id: u32, work_id: u32, raw: bool) -> Result<String, LoaderError> {
    let work = WorkId::new(author_id, work_id)?;
    let config = Config::load()?;
    config.validate()?;
    let loader = AozoraLoader::with_http(config.aozora)?;
    loader.load(work, TextMode::from_raw_flag(raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use encoding_rs::SHIFT_JIS;
    use std::cell::RefCell;
    use std::io::{Cursor, Read, Write};
    use std::net::{SocketAddr, TcpListener};
    use zip::write::SimpleFileOptions;

    const BASE_URL: &str = "https://example.com/cards/";

    const CARD_HTML: &str = r#"<!DOCTYPE html>
<html lang="ja">
<head><meta charset="utf-8"><title>図書カード：走れメロス</title></head>
<body>
<h1>図書カード：No.1567</h1>
<table class="download" summary="ダウンロードデータ">
<tr><th>ファイル種別</th><th>ファイル名</th></tr>
<tr><td>テキストファイル(ルビあり)</td><td><a href="./files/1567_ruby_4948.zip">1567_ruby_4948.zip</a></td></tr>
<tr><td>XHTMLファイル</td><td><a href="./files/1567_14913.html">1567_14913.html</a></td></tr>
</table>
</body>
</html>"#;

    const WORK_TEXT: &str = "走れメロス\r\n太宰治\r\n\r\n-------------------------------------------------------\r\n【テキスト中に現れる記号について】\r\n\r\n《》：ルビ\r\n（例）邪智暴虐《じゃちぼうぎゃく》\r\n\r\n［＃］：入力者注　主に外字の説明や、傍点の位置の指定\r\n（例）［＃地から１字上げ］\r\n-------------------------------------------------------\r\n\r\n　メロスは激怒した。必ず、かの邪智暴虐《じゃちぼうぎゃく》の王を除かなければならぬと決意した。メロスには政治がわからぬ。\r\n［＃５字下げ］一［＃「一」は中見出し］\r\n　｜老爺《ろうや》は、あたりをはばかる低声で、わずか答えた。\r\n\r\n\r\n\r\n底本：「太宰治全集３」ちくま文庫、筑摩書房\r\n　　　1988（昭和63）年10月25日初版発行\r\n入力：金川一之\r\n校正：高橋美奈子\r\n";

    const EXPECTED: &str = "　メロスは激怒した。必ず、かの邪智暴虐の王を除かなければならぬと決意した。メロスには政治がわからぬ。\n一\n　老爺は、あたりをはばかる低声で、わずか答えた。";

    /// Serves fixtures from memory and records requested URLs.
    #[derive(Default)]
    struct MockFetcher {
        responses: HashMap<String, Vec<u8>>,
        requests: RefCell<Vec<String>>,
    }

    impl MockFetcher {
        fn with(mut self, url: &str, body: Vec<u8>) -> Self {
            self.responses.insert(url.to_string(), body);
            self
        }
    }

    impl Fetch for MockFetcher {
        fn fetch(&self, url: &str) -> Result<Vec<u8>, LoaderError> {
            self.requests.borrow_mut().push(url.to_string());
            self.responses
                .get(url)
                .cloned()
                .ok_or_else(|| LoaderError::InvalidUrl(format!("no fixture for {url}")))
        }
    }

    fn config() -> AozoraConfig {
        AozoraConfig {
            base_url: BASE_URL.to_string(),
            ..AozoraConfig::default()
        }
    }

    fn work_zip(text: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("hashire_merosu.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&SHIFT_JIS.encode(text).0).unwrap();
        writer
            .start_file("fig1567_01.png", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"\x89PNG\r\n\x1a\n").unwrap();
        writer.finish().unwrap().into_inner()
    }

    fn melos_fetcher() -> MockFetcher {
        MockFetcher::default()
            .with(
                "https://example.com/cards/000035/card1567.html",
                CARD_HTML.as_bytes().to_vec(),
            )
            .with(
                "https://example.com/cards/000035/files/1567_ruby_4948.zip",
                work_zip(WORK_TEXT),
            )
    }

    #[test]
    fn test_work_id_validation() {
        assert!(WorkId::new(35, 1567).is_ok());
        assert!(matches!(
            WorkId::new(0, 1567),
            Err(LoaderError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            WorkId::new(35, 0),
            Err(LoaderError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_load_clean() {
        let loader = AozoraLoader::new(melos_fetcher(), config()).unwrap();
        let work = WorkId::new(35, 1567).unwrap();

        let text = loader.load(work, TextMode::Clean).unwrap();
        assert_eq!(text, EXPECTED);
    }

    #[test]
    fn test_load_raw() {
        let loader = AozoraLoader::new(melos_fetcher(), config()).unwrap();
        let work = WorkId::new(35, 1567).unwrap();

        let text = loader.load(work, TextMode::Raw).unwrap();
        assert_eq!(text, WORK_TEXT.replace("\r\n", "\n"));
        assert!(text.contains("邪智暴虐《じゃちぼうぎゃく》"));
        assert!(text.contains("底本："));
    }

    #[test]
    fn test_missing_archive_is_resolution_error() {
        let fetcher = MockFetcher::default().with(
            "https://example.com/cards/000035/card9999.html",
            b"<html><body><p>No files</p></body></html>".to_vec(),
        );
        let loader = AozoraLoader::new(fetcher, config()).unwrap();
        let work = WorkId::new(35, 9999).unwrap();

        let err = loader.load(work, TextMode::Clean).unwrap_err();
        match err {
            LoaderError::Resolution { card_url, work_id } => {
                assert_eq!(card_url, "https://example.com/cards/000035/card9999.html");
                assert_eq!(work_id, 9999);
            }
            other => panic!("expected resolution error, got {other:?}"),
        }
    }

    /// Answers a single request with `status_line` and an empty body.
    fn serve_once(status_line: &'static str) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let _ = write!(
                stream,
                "{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
            );
        });
        addr
    }

    fn local_http_fetcher() -> HttpFetcher {
        let client = reqwest::blocking::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpFetcher::from_client(client)
    }

    #[test]
    fn test_http_error_status_is_transport_error() {
        let addr = serve_once("HTTP/1.1 404 Not Found");
        let config = AozoraConfig {
            base_url: format!("http://{addr}/cards/"),
            ..AozoraConfig::default()
        };
        let loader = AozoraLoader::new(local_http_fetcher(), config).unwrap();

        let err = loader
            .load(WorkId::new(35, 1567).unwrap(), TextMode::Clean)
            .unwrap_err();
        match err {
            LoaderError::Transport(e) => {
                assert_eq!(e.status(), Some(reqwest::StatusCode::NOT_FOUND));
            }
            other => panic!("expected transport error, got {other:?}"),
        }
    }

    #[test]
    fn test_connection_refused_is_transport_error() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();

        let err = local_http_fetcher()
            .fetch(&format!("http://{addr}/cards/000035/card1567.html"))
            .unwrap_err();
        assert!(matches!(err, LoaderError::Transport(_)));
    }

    #[test]
    fn test_invalid_base_url_is_rejected_before_fetch() {
        let fetcher = MockFetcher::default();
        let config = AozoraConfig {
            base_url: "https://example.com/cards".to_string(),
            ..AozoraConfig::default()
        };

        let err = AozoraLoader::new(&fetcher, config).err().unwrap();
        assert!(matches!(err, LoaderError::Config(ConfigError::InvalidValue { .. })));

        let err = AozoraLoader::with_http(AozoraConfig {
            timeout_sec: 0,
            ..AozoraConfig::default()
        })
        .err()
        .unwrap();
        assert!(matches!(err, LoaderError::Config(_)));
        assert!(fetcher.requests.borrow().is_empty());
    }

    #[test]
    fn test_fetch_errors_propagate() {
        let loader = AozoraLoader::new(MockFetcher::default(), config()).unwrap();
        let work = WorkId::new(35, 1567).unwrap();

        let err = loader.load(work, TextMode::Clean).unwrap_err();
        assert!(matches!(err, LoaderError::InvalidUrl(_)));
    }

    #[test]
    fn test_card_cache_is_reused() {
        let loader = AozoraLoader::new(melos_fetcher(), config()).unwrap();
        let work = WorkId::new(35, 1567).unwrap();
        let mut cache = CardCache::new();

        loader.load_with_cache(work, TextMode::Clean, &mut cache).unwrap();
        loader.load_with_cache(work, TextMode::Raw, &mut cache).unwrap();

        assert_eq!(cache.len(), 1);
        let requests = loader.fetcher.requests.borrow();
        let card_requests = requests
            .iter()
            .filter(|url| url.ends_with("card1567.html"))
            .count();
        assert_eq!(card_requests, 1);
        assert_eq!(requests.len(), 3);
    }

    #[test]
    fn test_load_with_invalid_bytes() {
        let mut text_bytes = SHIFT_JIS.encode("本文の始まり。").0.into_owned();
        text_bytes.extend_from_slice(&[0x81, 0x20]);
        text_bytes.extend_from_slice(&SHIFT_JIS.encode("本文の続き。").0);

        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("work.txt", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&text_bytes).unwrap();
        let zip_bytes = writer.finish().unwrap().into_inner();

        let card = r#"<a href="./files/42_txt_1.zip">zip</a>"#;
        let fetcher = MockFetcher::default()
            .with(
                "https://example.com/cards/000001/card42.html",
                card.as_bytes().to_vec(),
            )
            .with("https://example.com/cards/000001/files/42_txt_1.zip", zip_bytes);
        let loader = AozoraLoader::new(fetcher, config()).unwrap();

        let text = loader
            .load(WorkId::new(1, 42).unwrap(), TextMode::Clean)
            .unwrap();
        assert!(text.starts_with("本文の始まり。"));
        assert!(text.ends_with("本文の続き。"));
    }

    #[test]
    fn test_card_url() {
        let loader = AozoraLoader::new(MockFetcher::default(), config()).unwrap();
        assert_eq!(
            loader.card_url(WorkId::new(35, 1567).unwrap()).unwrap(),
            "https://example.com/cards/000035/card1567.html"
        );
    }
}
