use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use pretty_assertions::assert_eq;
use smodel_core::field::processor;
use smodel_core::{
    Cache, Document, DocumentSource, ExtractionModel, FetchError, FieldDescriptor, Fetcher,
    MappingError, Model, Node, Query, Schema, Select, Selection, SmodelError, Value,
};

const PROFILE: &str = r#"<html><head><title>Guido van Rossum</title></head><body>
<div id="content">
  <div>
    <table>
      <tr><th>Guido van Rossum</th></tr>
      <tr><td><a href="/wiki/File:Guido.jpg"><img src="guido.jpg"></a></td></tr>
      <tr><td>Born 31 January 1956</td></tr>
      <tr><td><a href="/wiki/Dutch_people">Dutch</a></td></tr>
    </table>
  </div>
  <div><h1 id="section_0">Guido van Rossum</h1></div>
  <div>
    <ul>
      <li><a class="external" href="https://www.python.org">Python</a></li>
      <li><a class="external" href="https://neopythonic.blogspot.com">Blog</a></li>
      <li><a href="/wiki/Python">internal</a></li>
    </ul>
  </div>
</div>
</body></html>"#;

const PROFILE_URL: &str = "http://en.m.wikipedia.org/wiki/Guido_van_Rossum";

struct Profile;

impl Model for Profile {
    fn schema() -> Schema {
        Schema::builder()
            .field(
                "photo_url",
                FieldDescriptor::xpath(r#"//*[@id="content"]/div[1]/table/tbody/tr[2]/td/a"#),
            )
            .field(
                "nationality",
                FieldDescriptor::css("#content > div:nth-child(1) > table tr:nth-child(4) > td > a::text")
                    .take_first()
                    .with_processors([processor::uppercase()]),
            )
            .field(
                "links",
                FieldDescriptor::css("#content ul > li > a.external::attr(href)").extract_all(),
            )
            .hook("photo_url", |raw| {
                let nodes = raw.as_nodes().ok_or("photo_url is not a selection")?;
                let href = nodes
                    .xpath("@href")?
                    .extract_first()
                    .ok_or("photo link has no href")?;
                Ok(Value::Text(format!("http://en.m.wikipedia.org{}", href)))
            })
            .hook("name", |raw| {
                let name = raw
                    .as_nodes()
                    .and_then(Selection::extract_first)
                    .ok_or("no name")?;
                Ok(Value::Text(name))
            })
            .post_parse(|record, ctx| {
                record.set_attr("url", Value::from(ctx.url.map(str::to_string)));
            })
            .build()
    }
}

struct CountingFetcher {
    body: String,
    calls: AtomicUsize,
}

impl CountingFetcher {
    fn new(body: &str) -> Arc<Self> {
        Arc::new(Self {
            body: body.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Fetcher for CountingFetcher {
    fn get(&self, _url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.clone().into_bytes())
    }
}

#[derive(Default)]
struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    ttl: Mutex<Option<Duration>>,
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        *self.ttl.lock().unwrap() = ttl;
        self.entries.lock().unwrap().insert(key.to_string(), value.to_vec());
    }
}

fn profile_model(fetcher: Arc<CountingFetcher>) -> ExtractionModel {
    ExtractionModel::of::<Profile>()
        .with_url(PROFILE_URL)
        .with_source(DocumentSource::from_shared(fetcher))
}

#[test]
fn test_profile_extraction() {
    let fetcher = CountingFetcher::new(PROFILE);
    let mut model = profile_model(fetcher.clone());
    model.mappings_mut().insert("name", Query::css("#section_0::text"));

    let record = model.parse().unwrap();

    assert_eq!(
        record.keys().collect::<Vec<_>>(),
        vec!["photo_url", "nationality", "links", "name", "url"]
    );
    assert_eq!(
        record["photo_url"],
        Value::from("http://en.m.wikipedia.org/wiki/File:Guido.jpg")
    );
    assert_eq!(record["nationality"], Value::from("DUTCH"));
    assert_eq!(
        record["links"],
        Value::from(vec!["https://www.python.org", "https://neopythonic.blogspot.com"])
    );
    assert_eq!(record["name"], Value::from("Guido van Rossum"));
    assert_eq!(record["url"], Value::from(PROFILE_URL));
    assert_eq!(fetcher.calls(), 1);

    let snapshot = model.raw_snapshot();
    assert!(matches!(snapshot["photo_url"], Value::Nodes(ref s) if s.len() == 1));
    assert_eq!(
        snapshot["name"],
        Value::Nodes(Selection::new(vec![Node::Text("Guido van Rossum".to_string())]))
    );
    assert!(!snapshot.contains_key("url"));

    let name = model.field("name").unwrap();
    assert!(name.is_generic());
    assert_eq!(name.value(), Some(&Value::from("Guido van Rossum")));
}

#[test]
fn test_populate_selected_fields() {
    let mut model = profile_model(CountingFetcher::new(PROFILE));
    model.mappings_mut().insert("name", Query::css("#section_0::text"));
    model.parse().unwrap();

    let mut target: HashMap<String, Value> = HashMap::new();
    model.populate(&mut target, Some(&["name", "nationality"]));

    assert_eq!(target.len(), 2);
    assert_eq!(target["name"], Value::from("Guido van Rossum"));
    assert_eq!(target["nationality"], Value::from("DUTCH"));
}

#[test]
fn test_document_is_fetched_once_per_instance() {
    let fetcher = CountingFetcher::new(PROFILE);
    let mut model = profile_model(fetcher.clone());

    model.parse().unwrap();
    model.parse().unwrap();
    model.fetch().unwrap();
    assert_eq!(fetcher.calls(), 2);

    model.set_refresh(true);
    model.parse().unwrap();
    assert_eq!(fetcher.calls(), 3);
}

#[test]
fn test_cached_source_shared_between_instances() {
    let fetcher = CountingFetcher::new(PROFILE);
    let cache = Arc::new(MemoryCache::default());
    let source = DocumentSource::from_shared(fetcher.clone())
        .with_cache(cache.clone())
        .with_expiry(Some(Duration::from_secs(1800)));

    for _ in 0..3 {
        let mut model = ExtractionModel::of::<Profile>()
            .with_url(PROFILE_URL)
            .with_source(source.clone());
        assert_eq!(model.parse().unwrap()["nationality"], Value::from("DUTCH"));
    }

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(*cache.ttl.lock().unwrap(), Some(Duration::from_secs(1800)));
    assert!(cache.entries.lock().unwrap().contains_key(PROFILE_URL));
}

#[test]
fn test_fetch_failure_aborts_parse() {
    let failing = |url: &str| -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Status {
            url: url.to_string(),
            status: 503,
        })
    };
    let mut model = ExtractionModel::of::<Profile>()
        .with_url(PROFILE_URL)
        .with_source(DocumentSource::new(failing));

    let err = model.parse().unwrap_err();
    assert!(matches!(err, SmodelError::Fetch(FetchError::Status { status: 503, .. })));
    assert!(model.record().is_empty());
}

#[test]
fn test_failing_hook_keeps_extracted_value() {
    let schema = Schema::builder()
        .field("title", FieldDescriptor::css("title::text").take_first())
        .hook("title", |_| Err("upstream lookup failed".into()))
        .build();
    let doc = Document::parse(PROFILE);
    let mut model = ExtractionModel::new(schema);

    model.parse_document(&doc).unwrap();

    assert_eq!(model.record()["title"], Value::from("Guido van Rossum"));
    assert_eq!(
        model.field("title").and_then(|f| f.value()),
        Some(&Value::from("Guido van Rossum"))
    );
}

#[test]
fn test_mapping_file_overrides_declared_field() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{"links": {{"xpath": "//li/a/text()"}}}}"#).unwrap();

    let doc = Document::parse(PROFILE);
    let mut model = ExtractionModel::of::<Profile>();
    model.load_mappings_from_path(file.path()).unwrap();
    model.parse_document(&doc).unwrap();

    let links = model.record()["links"].as_nodes().unwrap().extract();
    assert_eq!(links, vec!["Python", "Blog", "internal"]);
}

#[test]
fn test_mapping_reload_replaces_query() {
    let mut model = ExtractionModel::of::<Profile>();
    model.mappings_mut().insert("test", Query::xpath("//p"));

    model.load_mappings_from_str(r#"{"test": {"css": "div"}}"#).unwrap();

    assert_eq!(model.mappings().get("test"), Some(&Query::css("div")));

    let doc = Document::parse("<html><body><div>hello</div></body></html>");
    let record = model.parse_document(&doc).unwrap();
    assert_eq!(
        record["test"],
        Value::Nodes(Selection::new(vec![Node::Element("<div>hello</div>".to_string())]))
    );
}

#[test]
fn test_malformed_mapping_file_is_rejected() {
    let mut model = ExtractionModel::of::<Profile>();
    let err = model
        .load_mappings_from_reader(r#"{"name": {"css": "h1", "xpath": "//h1"}}"#.as_bytes())
        .unwrap_err();

    assert!(matches!(err, MappingError::Malformed { .. }));
    assert!(model.mappings().is_empty());
}

#[test]
fn test_schema_default_mappings_are_per_instance() {
    let schema = Schema::builder()
        .field("heading", FieldDescriptor::css("h1::text").take_first())
        .mapping("heading", Query::xpath("//th/text()"))
        .build();
    let doc = Document::parse(PROFILE);

    let mut first = ExtractionModel::new(schema.clone());
    first.mappings_mut().remove("heading");
    first.parse_document(&doc).unwrap();

    let mut second = ExtractionModel::new(schema);
    second.parse_document(&doc).unwrap();

    assert_eq!(first.record()["heading"], Value::from("Guido van Rossum"));
    assert!(matches!(second.record()["heading"], Value::Nodes(_)));
}

#[test]
fn test_record_and_fields_agree_after_parse() {
    let doc = Document::parse(PROFILE);
    let mut model = ExtractionModel::of::<Profile>().with_url(PROFILE_URL);
    model.mappings_mut().insert("name", Query::css("#section_0::text"));
    model.mappings_mut().insert("rows", Query::xpath("count(//tr)"));

    model.parse_document(&doc).unwrap();

    assert_eq!(model.record().len(), model.fields().count());
    for (identifier, value) in model.record() {
        assert_eq!(model.field(identifier).and_then(|f| f.value()), Some(value));
    }
    assert_eq!(
        model.record()["rows"],
        Value::Nodes(Selection::new(vec![Node::Text("4".to_string())]))
    );
}

#[test]
fn test_instances_parse_independently_across_threads() {
    let schema = Profile::schema();
    let handles: Vec<_> = ["Dutch", "Swiss", "Danish"]
        .into_iter()
        .map(|nationality| {
            let schema = schema.clone();
            let body = PROFILE.replace("Dutch", nationality);
            thread::spawn(move || {
                let mut model = ExtractionModel::new(schema)
                    .with_url(PROFILE_URL)
                    .with_source(DocumentSource::from_shared(CountingFetcher::new(&body)));
                let nationality = model.parse().unwrap()["nationality"].clone();
                nationality
            })
        })
        .collect();

    let results: Vec<Value> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(
        results,
        vec![Value::from("DUTCH"), Value::from("SWISS"), Value::from("DANISH")]
    );
}
