//! Order creation against in-memory stores.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use quardcube_core::{CartLine, OrderStatus, Price, ProductId, UserId};
use quardcube_integration_tests::{
    MemoryCatalog, MemoryOrders, RecordingMailer, customer, product,
};
use quardcube_storefront::services::effects::SideEffect;
use quardcube_storefront::services::orders::{OrderError, OrderService};

const ADMIN: &str = "orders@quardcube.test";

struct Shop {
    catalog: MemoryCatalog,
    orders: MemoryOrders,
    mailer: RecordingMailer,
}

impl Shop {
    fn with_stock(stock: i32) -> Self {
        Self {
            catalog: MemoryCatalog::new(vec![
                product(1, "Arduino Uno R3", 3_500_000, stock),
                product(2, "Breadboard", 400_000, 10),
            ]),
            orders: MemoryOrders::new(),
            mailer: RecordingMailer::new(),
        }
    }

    fn service(&self) -> OrderService<'_, MemoryCatalog, MemoryOrders, RecordingMailer> {
        OrderService::new(&self.catalog, &self.orders, &self.mailer, ADMIN)
    }
}

#[tokio::test]
async fn order_within_stock_decrements_and_snapshots_line() {
    let shop = Shop::with_stock(5);
    let user_id = UserId::generate();

    let receipt = shop
        .service()
        .create_order(ProductId::new(1), 3, user_id, customer("Amani Juma", None))
        .await
        .unwrap();

    assert_eq!(shop.catalog.stock_of(ProductId::new(1)), Some(2));
    assert_eq!(receipt.total, Price::from_cents(10_500_000));
    assert!(receipt.side_effects.is_clean());

    let orders = shop.orders.all();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order.id, receipt.order_id);
    assert_eq!(order.user_id, user_id);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_method, "Credit Card");
    assert_eq!(order.shipping_address.country, "Tanzania");
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].name, "Arduino Uno R3");
    assert_eq!(order.items[0].price, Price::from_cents(3_500_000));
    assert_eq!(order.items[0].quantity, 3);
}

#[tokio::test]
async fn insufficient_stock_writes_nothing() {
    let shop = Shop::with_stock(2);

    let err = shop
        .service()
        .create_order(ProductId::new(1), 3, UserId::generate(), customer("Amani", None))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::InsufficientStock { available: 2, requested: 3, .. }
    ));
    assert_eq!(
        err.to_string(),
        "Insufficient stock for Arduino Uno R3. Available: 2, Requested: 3"
    );
    assert_eq!(shop.catalog.stock_of(ProductId::new(1)), Some(2));
    assert!(shop.orders.all().is_empty());
    assert!(shop.mailer.sent().is_empty());
}

#[tokio::test]
async fn exact_stock_can_be_ordered() {
    let shop = Shop::with_stock(3);

    shop.service()
        .create_order(ProductId::new(1), 3, UserId::generate(), customer("Amani", None))
        .await
        .unwrap();

    assert_eq!(shop.catalog.stock_of(ProductId::new(1)), Some(0));
}

#[tokio::test]
async fn unknown_product_and_bad_input_are_rejected() {
    let shop = Shop::with_stock(5);
    let service = shop.service();
    let user_id = UserId::generate();

    let missing = service
        .create_order(ProductId::new(99), 1, user_id, customer("Amani", None))
        .await
        .unwrap_err();
    assert!(matches!(missing, OrderError::ProductNotFound(id) if id == ProductId::new(99)));

    let zero = service
        .create_order(ProductId::new(1), 0, user_id, customer("Amani", None))
        .await
        .unwrap_err();
    assert!(matches!(zero, OrderError::InvalidQuantity));

    let nameless = service
        .create_order(ProductId::new(1), 1, user_id, customer("   ", None))
        .await
        .unwrap_err();
    assert!(matches!(nameless, OrderError::MissingCustomerName));

    assert!(shop.orders.all().is_empty());
}

#[tokio::test]
async fn placed_order_keeps_its_snapshot_after_catalog_edits() {
    let shop = Shop::with_stock(5);
    let user_id = UserId::generate();

    let receipt = shop
        .service()
        .create_order(ProductId::new(1), 1, user_id, customer("Amani", None))
        .await
        .unwrap();

    shop.catalog
        .edit(ProductId::new(1), "Arduino Uno R4", Price::from_cents(4_200_000));

    let order = shop
        .orders
        .all()
        .into_iter()
        .find(|o| o.id == receipt.order_id)
        .unwrap();
    assert_eq!(order.items[0].name, "Arduino Uno R3");
    assert_eq!(order.items[0].price, Price::from_cents(3_500_000));
    assert_eq!(order.total_amount, Price::from_cents(3_500_000));
}

#[tokio::test]
async fn emails_go_to_admin_and_customer() {
    let shop = Shop::with_stock(5);

    let receipt = shop
        .service()
        .create_order(
            ProductId::new(1),
            1,
            UserId::generate(),
            customer("Amani", Some("amani@example.com")),
        )
        .await
        .unwrap();

    let sent = shop.mailer.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, ADMIN);
    assert!(sent[0].subject.starts_with("New Order #"));
    assert_eq!(sent[1].to, "amani@example.com");
    assert!(receipt.admin_email.is_sent());
    assert!(receipt.customer_email.as_ref().is_some_and(|c| c.is_sent()));
}

#[tokio::test]
async fn no_customer_email_skips_confirmation() {
    let shop = Shop::with_stock(5);

    let receipt = shop
        .service()
        .create_order(ProductId::new(1), 1, UserId::generate(), customer("Amani", None))
        .await
        .unwrap();

    assert_eq!(shop.mailer.sent().len(), 1);
    assert!(receipt.customer_email.is_none());
}

#[tokio::test]
async fn mail_failure_does_not_fail_the_order() {
    let shop = Shop {
        mailer: RecordingMailer::new().refusing(ADMIN),
        ..Shop::with_stock(5)
    };

    let receipt = shop
        .service()
        .create_order(
            ProductId::new(1),
            1,
            UserId::generate(),
            customer("Amani", Some("amani@example.com")),
        )
        .await
        .unwrap();

    assert!(!receipt.admin_email.is_sent());
    assert!(receipt.side_effects.has_failed(SideEffect::AdminNotification));
    assert!(!receipt.side_effects.has_failed(SideEffect::CustomerConfirmation));
    assert_eq!(shop.orders.all().len(), 1);
}

#[tokio::test]
async fn failed_decrement_is_reported_not_fatal() {
    let shop = Shop::with_stock(5);
    shop.catalog.fail_decrements();

    let receipt = shop
        .service()
        .create_order(ProductId::new(1), 2, UserId::generate(), customer("Amani", None))
        .await
        .unwrap();

    assert!(receipt.side_effects.has_failed(SideEffect::StockDecrement));
    assert_eq!(shop.catalog.stock_of(ProductId::new(1)), Some(5));
    assert_eq!(shop.orders.all().len(), 1);
}

#[tokio::test]
async fn failed_insert_fails_the_order_and_keeps_stock() {
    let shop = Shop::with_stock(5);
    shop.orders.fail_inserts();

    let err = shop
        .service()
        .create_order(ProductId::new(1), 2, UserId::generate(), customer("Amani", None))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::Store(_)));
    assert_eq!(shop.catalog.stock_of(ProductId::new(1)), Some(5));
    assert!(shop.mailer.sent().is_empty());
}

#[tokio::test]
async fn checkout_orders_each_line_independently() {
    let shop = Shop::with_stock(1);
    let line = |product: quardcube_storefront::models::Product, quantity: u32| CartLine {
        product: product.to_cart_product(),
        quantity,
    };
    let lines = vec![
        line(product(1, "Arduino Uno R3", 3_500_000, 1), 2),
        line(product(2, "Breadboard", 400_000, 10), 4),
    ];

    let summary = shop
        .service()
        .checkout(&lines, UserId::generate(), &customer("Amani", None))
        .await;

    assert_eq!(summary.receipts.len(), 1);
    assert_eq!(summary.ordered, vec![ProductId::new(2)]);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].product_id, ProductId::new(1));
    assert!(summary.failures[0].message.contains("Insufficient stock"));
    assert_eq!(shop.catalog.stock_of(ProductId::new(1)), Some(1));
    assert_eq!(shop.catalog.stock_of(ProductId::new(2)), Some(6));
}
