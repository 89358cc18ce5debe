use harvester_core::{ResourceKind, ResourceStore, ResourceWrite};

use crate::integration::common::cache_backends;

const URL: &str = "https://example.com/team";

#[tokio::test]
async fn prompts_partition_lookups_on_every_backend() {
    let (backends, _dir) = cache_backends();

    for (name, cache) in backends {
        cache
            .write_multi(
                ResourceWrite::new(URL)
                    .extracted("Example Team")
                    .extraction_prompt("get the title"),
            )
            .await
            .unwrap();
        cache
            .write_multi(
                ResourceWrite::new(URL)
                    .extracted("team@example.com")
                    .extraction_prompt("find emails"),
            )
            .await
            .unwrap();
        let plain = cache
            .write_multi(ResourceWrite::new(URL).cleaned("# Team"))
            .await
            .unwrap();

        let unprompted = cache.find_by_url_and_extract(URL, None).await.unwrap();
        assert_eq!(unprompted.len(), 1, "{name}");
        assert_eq!(unprompted[0].uri, plain[0].uri, "{name}");
        assert_eq!(unprompted[0].kind(), ResourceKind::Cleaned, "{name}");

        let titled = cache
            .find_by_url_and_extract(URL, Some("get the title"))
            .await
            .unwrap();
        assert_eq!(titled.len(), 1, "{name}");
        assert_eq!(titled[0].content, "Example Team", "{name}");

        let all = cache.list().await.unwrap();
        assert_eq!(all.len(), 3, "{name}");
        assert_eq!(all[0].uri, plain[0].uri, "{name}: newest first");
    }
}

#[tokio::test]
async fn resources_are_never_rewritten() {
    let (backends, _dir) = cache_backends();

    for (name, cache) in backends {
        let first = cache
            .write_multi(ResourceWrite::new(URL).raw("v1"))
            .await
            .unwrap();
        let second = cache
            .write_multi(ResourceWrite::new(URL).raw("v2"))
            .await
            .unwrap();

        assert_ne!(first[0].uri, second[0].uri, "{name}");
        assert_eq!(cache.read(&first[0].uri).await.unwrap().content, "v1", "{name}");
        let latest = cache.find_by_url_and_extract(URL, None).await.unwrap();
        assert_eq!(latest[0].content, "v2", "{name}");
        assert_eq!(latest[1].content, "v1", "{name}");
    }
}

#[tokio::test]
async fn unknown_uri_is_not_found_on_every_backend() {
    let (backends, _dir) = cache_backends();

    for (name, cache) in backends {
        let missing = "cache://0000000000000000/00000000000000000001-raw";
        assert!(!cache.exists(missing).await.unwrap(), "{name}");
        assert!(
            matches!(
                cache.read(missing).await,
                Err(harvester_core::AppError::ResourceNotFound { .. })
            ),
            "{name}"
        );
        assert!(cache.delete(missing).await.is_err(), "{name}");
    }
}
