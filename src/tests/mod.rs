use crate::{
    api::{ImageRecord, local},
    cache::QueryCache,
    feed::{FeedLoader, FetchOutcome, IMAGES_KEY, Pages},
    form::{Field, NotificationStatus, SelectedFile, SubmitError, UploadForm, validate},
    viewer::ImageViewer,
};

fn seed(count: usize) -> Vec<ImageRecord> {
    (0..count)
        .map(|i| ImageRecord {
            id: format!("seed-{i}"),
            title: format!("Image {i}"),
            description: format!("Seeded image number {i}"),
            url: format!("https://i.ibb.co/seed/{i}.jpg").parse().unwrap(),
            created_at: chrono::DateTime::from_timestamp(1_620_000_000 + i as i64, 0).unwrap(),
        })
        .collect()
}

#[tokio::test]
async fn test_upload_then_browse() {
    let gallery = local::Client::with_records(2, seed(3));
    let mut cache = QueryCache::<Pages>::new();
    let mut feed = FeedLoader::default();

    let view = feed.read(&gallery, &mut cache).await.unwrap();
    assert_eq!(view.len(), 2);
    assert!(view.has_next());
    assert_eq!(
        feed.load_next_page(&gallery, &mut cache).await.unwrap(),
        FetchOutcome::Appended { items: 1 }
    );
    assert!(!feed.view(&cache).has_next());
    assert_eq!(gallery.fetch_count(), 2);

    let mut form = UploadForm::new();
    let draft = form.open();
    draft.set_title("Hi");
    draft.set_description("A new picture of the beach");
    let photo = SelectedFile::from_bytes("beach.png", vec![7u8; 5 * 1024 * 1024]);
    let hosted = form.select_file(&gallery, photo).await.unwrap();

    let notification = form.submit(&gallery, &mut cache).await.unwrap();
    assert_eq!(notification.status, NotificationStatus::Success);
    assert_eq!(notification.title, "Imagem cadastrada");
    assert!(!form.is_open());
    assert!(!cache.contains(IMAGES_KEY));

    let view = feed.read(&gallery, &mut cache).await.unwrap();
    assert_eq!(gallery.fetch_count(), 3);
    let titles = view.items().map(|r| r.title.as_str()).collect::<Vec<_>>();
    assert_eq!(titles, ["Image 0", "Image 1"]);
    assert!(view.has_next());

    while feed.load_next_page(&gallery, &mut cache).await.unwrap() != FetchOutcome::Exhausted {}
    let view = feed.view(&cache);
    assert_eq!(view.len(), 4);
    let created = view.items().last().unwrap();
    assert_eq!(created.title, "Hi");
    assert_eq!(created.url, hosted);

    let mut viewer = ImageViewer::new();
    viewer.open(created.url.clone());
    assert_eq!(viewer.original_link().unwrap().href, hosted);
}

#[tokio::test]
async fn test_initial_load_failure_then_reload() {
    let gallery = local::Client::with_records(2, seed(1));
    gallery.fail_next_fetches(1);
    let mut cache = QueryCache::<Pages>::new();
    let mut feed = FeedLoader::default();

    assert!(feed.read(&gallery, &mut cache).await.is_err());
    assert!(feed.view(&cache).is_error());

    let view = feed.read(&gallery, &mut cache).await.unwrap();
    assert!(!view.is_error());
    assert_eq!(view.len(), 1);
    assert!(!view.has_next());
}

#[tokio::test]
async fn test_form_scenario_messages() {
    let gallery = local::Client::new(10);
    let mut cache = QueryCache::<Pages>::new();
    let mut form = UploadForm::new();

    let gif = SelectedFile::from_bytes("large.gif", vec![0u8; 11 * 1024 * 1024]);
    form.select_file(&gallery, gif).await.unwrap_err();
    let draft = form.draft_mut().unwrap();
    draft.set_title("");
    draft.set_description("d".repeat(66));

    let Err(SubmitError::Invalid(errors)) = form.submit(&gallery, &mut cache).await else {
        panic!("submission should be blocked");
    };
    assert_eq!(errors.get(Field::Image), Some(validate::IMAGE_TOO_LARGE));
    assert_eq!(errors.get(Field::Title), Some("Título obrigatório"));
    assert_eq!(
        errors.get(Field::Description),
        Some(validate::DESCRIPTION_TOO_LONG)
    );

    let png = SelectedFile::from_bytes("small.png", vec![0u8; 5 * 1024 * 1024]);
    form.select_file(&gallery, png).await.unwrap();
    let draft = form.draft_mut().unwrap();
    draft.set_title("Hi");
    draft.set_description("d".repeat(65));
    form.validate().unwrap();
    assert!(form.errors().is_empty());
}
