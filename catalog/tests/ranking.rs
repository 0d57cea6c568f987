mod common;

use catalog::codec::JsonCodec;
use catalog::domain::{CacheSettings, CategoryId, Product};
use catalog::keys::ranking_key;
use catalog::planes::data::{ProductCacheOperations, RankingBoard};
use common::{Harness, product};
use std::sync::Arc;
use storage_engine::MokaStore;

#[tokio::test]
async fn test_top_ranking_is_capped_and_ordered() {
    let h = Harness::new(CacheSettings::default(), vec![]).await;
    let products: Vec<Product> = (0..150).map(|i| product(i, 1, i * 10)).collect();

    let report = h
        .service
        .warmup_ranking_batch(CategoryId(1), &products)
        .await
        .unwrap();
    assert_eq!(report.submitted(), 150);
    assert!(report.is_complete());

    let top = h.service.get_top_ranking(CategoryId(1)).await.unwrap();
    assert_eq!(top.len(), 100);
    assert_eq!(top[0].score, 1490.0);
    assert_eq!(top[0].member, products[149].summary());
    assert_eq!(top[99].score, 500.0);
    assert!(top.windows(2).all(|pair| pair[0].score >= pair[1].score));
}

#[tokio::test]
async fn test_rewarming_rescores_instead_of_duplicating() {
    let h = Harness::new(CacheSettings::default(), vec![]).await;
    let mut products = vec![product(1, 1, 10), product(2, 1, 20)];

    h.service
        .warmup_ranking_batch(CategoryId(1), &products)
        .await
        .unwrap();

    products[0].view = 30;
    h.service
        .warmup_ranking_batch(CategoryId(1), &products)
        .await
        .unwrap();

    let top = h.service.get_top_ranking(CategoryId(1)).await.unwrap();
    assert_eq!(top.len(), 2);
    assert_eq!(top[0].member.product_id, products[0].id);
    assert_eq!(top[0].score, 30.0);
}

#[tokio::test]
async fn test_categories_are_ranked_separately() {
    let h = Harness::new(CacheSettings::default(), vec![]).await;

    h.service
        .warmup_ranking_batch(CategoryId(1), &[product(1, 1, 5)])
        .await
        .unwrap();
    h.service
        .warmup_ranking_batch(CategoryId(2), &[product(2, 2, 9), product(3, 2, 1)])
        .await
        .unwrap();

    assert_eq!(h.service.get_top_ranking(CategoryId(1)).await.unwrap().len(), 1);
    assert_eq!(h.service.get_top_ranking(CategoryId(2)).await.unwrap().len(), 2);
    assert!(h.service.get_top_ranking(CategoryId(3)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_set_ranking_entry_reports_new_members() {
    let h = Harness::new(CacheSettings::default(), vec![]).await;
    let key = ranking_key(CategoryId(4));
    let member = product(8, 4, 0).summary();

    assert!(h.service.set_ranking_entry(&key, &member, 12.0).await.unwrap());
    assert!(!h.service.set_ranking_entry(&key, &member, 40.0).await.unwrap());

    let top = h.service.get_top_ranking(CategoryId(4)).await.unwrap();
    assert_eq!(top.len(), 1);
    assert_eq!(top[0].score, 40.0);
}

#[tokio::test]
async fn test_zero_limit_returns_nothing() {
    let store = Arc::new(MokaStore::new_unbounded());
    let board = RankingBoard::new(store.clone(), JsonCodec, 0);

    board
        .warmup_batch(CategoryId(1), &[product(1, 1, 3)])
        .await
        .unwrap();

    assert!(board.top_n(CategoryId(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ranking_warmup_is_one_round_trip() {
    let h = Harness::new(CacheSettings::default(), vec![]).await;
    let products: Vec<Product> = (0..40).map(|i| product(i, 7, i)).collect();

    let before = h.store.round_trips();
    h.service
        .warmup_ranking_batch(CategoryId(7), &products)
        .await
        .unwrap();
    assert_eq!(h.store.round_trips() - before, 1);
}
