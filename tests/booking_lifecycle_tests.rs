use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use skytravels::application::booking::{NewBooking, PaymentRequest};
use skytravels::domain::audit::{AuditAction, AuditEntity};
use skytravels::domain::booking::{BookingFilter, BookingStatus, PaymentMethod, PaymentStatus};
use skytravels::domain::money::Money;
use skytravels::domain::page::PageRequest;
use skytravels::domain::user::{Actor, Role};
use skytravels::error::{ErrorKind, TravelError};
use uuid::Uuid;

mod common;

fn request(user_id: Uuid, package_id: Uuid, adults: i64, children: i64) -> NewBooking {
    NewBooking {
        user_id,
        package_id,
        adults,
        children,
        travel_date: common::TRAVEL_DATE.to_string(),
    }
}

fn card(label: &str) -> PaymentRequest {
    PaymentRequest {
        method: PaymentMethod::CreditCard,
        label: label.to_string(),
        make_default: false,
    }
}

#[tokio::test]
async fn test_full_lifecycle_round_trip() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, dec!(5000), 10).await;
    let user = common::seed_user(&h.stores, "Asha Rao", "asha@example.com", Role::User).await;
    let admin = common::seed_user(&h.stores, "Root Admin", "root@example.com", Role::Admin).await;

    let booking = h
        .services
        .bookings
        .create_booking(request(user.id, package.id, 3, 2))
        .await
        .unwrap();
    assert_eq!(booking.seats_booked, 5);
    assert_eq!(booking.total_amount(), Money::new(dec!(20000)).unwrap());
    assert_eq!(booking.fare_breakup.adult_fare, Money::new(dec!(15000)).unwrap());
    assert_eq!(booking.fare_breakup.child_fare, Money::new(dec!(5000)).unwrap());
    assert_eq!(booking.payment_status(), PaymentStatus::Pending);
    assert_eq!(booking.booking_status(), BookingStatus::AwaitingPayment);

    let remaining = h.services.catalog.get(package.id).await.unwrap();
    assert_eq!(remaining.available_seats, 5);

    let paid = h
        .services
        .bookings
        .simulate_payment(booking.id, Actor::user(user.id), card("VISA **** 4242"))
        .await
        .unwrap();
    assert_eq!(paid.payment_status(), PaymentStatus::Success);
    assert_eq!(paid.booking_status(), BookingStatus::AwaitingAdminConfirmation);
    let receipt = paid.state.payment().unwrap();
    assert!(receipt.transaction_id.starts_with("TXN_"));
    assert_eq!(receipt.label, "VISA **** 4242");

    let confirmed = h
        .services
        .bookings
        .confirm_booking(booking.id, Actor::admin(admin.id))
        .await
        .unwrap();
    assert_eq!(confirmed.booking_status(), BookingStatus::Confirmed);
    assert_eq!(confirmed.payment_status(), PaymentStatus::Success);
    let confirmation = confirmed.state.confirmation().unwrap();
    assert_eq!(confirmation.confirmed_by, format!("ADMIN:{}", admin.id));
    assert_eq!(confirmation.confirmed_at, common::now());

    // Exactly one entry per transition, in order.
    let entries = h.audit.snapshot().await;
    let actions: Vec<AuditAction> = entries.iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        [
            AuditAction::CreateBooking,
            AuditAction::PaymentSuccess,
            AuditAction::ConfirmBooking
        ]
    );
    for entry in &entries {
        assert_eq!(entry.entity, AuditEntity::Booking);
        assert_eq!(entry.entity_id, booking.id.to_string());
        let new = entry.new_data.as_ref().and_then(|s| s.as_booking()).unwrap();
        assert_eq!(new.booking_id, booking.id);
    }
    assert!(entries[0].old_data.is_none());
    assert_eq!(entries[0].performed_by, format!("USER:Asha Rao ({})", user.id));
    assert_eq!(entries[2].performed_by, format!("ADMIN:Root Admin ({})", admin.id));

    let paid_new = entries[1].new_data.as_ref().and_then(|s| s.as_booking()).unwrap();
    assert_eq!(paid_new.payment_status, PaymentStatus::Success);
    assert_eq!(paid_new.user_email.as_deref(), Some("asha@example.com"));
    let paid_old = entries[1].old_data.as_ref().and_then(|s| s.as_booking()).unwrap();
    assert_eq!(paid_old.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_create_booking_validation() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, dec!(1000), 30).await;
    let user = Uuid::new_v4();

    let cases = [
        (0, 0, common::TRAVEL_DATE),
        (21, 0, common::TRAVEL_DATE),
        (1, -1, common::TRAVEL_DATE),
        (10, 11, common::TRAVEL_DATE),
        (1, 0, "2024-12-31"),
        (1, 0, "not-a-date"),
    ];
    for (adults, children, date) in cases {
        let mut req = request(user, package.id, adults, children);
        req.travel_date = date.to_string();
        let err = h.services.bookings.create_booking(req).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "{adults}/{children}/{date}");
    }

    // Nothing was reserved and nothing was audited.
    let pkg = h.services.catalog.get(package.id).await.unwrap();
    assert_eq!(pkg.available_seats, 30);
    assert!(h.audit.snapshot().await.is_empty());
}

#[tokio::test]
async fn test_create_booking_unknown_package() {
    let h = common::harness();
    let err = h
        .services
        .bookings
        .create_booking(request(Uuid::new_v4(), Uuid::new_v4(), 1, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, TravelError::NotFoundError("Package")));
}

#[tokio::test]
async fn test_create_booking_over_capacity() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, dec!(1000), 3).await;

    let err = h
        .services
        .bookings
        .create_booking(request(Uuid::new_v4(), package.id, 2, 2))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(err.to_string(), "Only 3 seats are available for this package");

    let pkg = h.services.catalog.get(package.id).await.unwrap();
    assert_eq!(pkg.available_seats, 3);
}

#[tokio::test]
async fn test_unpriceable_fare_keeps_seats() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, Decimal::MAX, 10).await;
    let user = common::seed_user(&h.stores, "Asha Rao", "asha@example.com", Role::User).await;

    let err = h
        .services
        .bookings
        .create_booking(request(user.id, package.id, 2, 0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let pkg = h.services.catalog.get(package.id).await.unwrap();
    assert_eq!(pkg.available_seats, 10);
    let bookings = h.stores.bookings.scan(BookingFilter::default()).await.unwrap();
    assert!(bookings.is_empty());
    assert!(h.audit.snapshot().await.is_empty());

    // A single adult at the same price is still representable.
    let booking = h
        .services
        .bookings
        .create_booking(request(user.id, package.id, 1, 0))
        .await
        .unwrap();
    assert_eq!(booking.total_amount(), Money::new(Decimal::MAX).unwrap());
}

#[tokio::test]
async fn test_payment_is_idempotent() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, dec!(1000), 10).await;
    let user = common::seed_user(&h.stores, "Asha Rao", "asha@example.com", Role::User).await;
    let booking = h
        .services
        .bookings
        .create_booking(request(user.id, package.id, 2, 1))
        .await
        .unwrap();

    let first = h
        .services
        .bookings
        .simulate_payment(booking.id, Actor::user(user.id), card("UPI asha@bank"))
        .await
        .unwrap();
    let second = h
        .services
        .bookings
        .simulate_payment(booking.id, Actor::user(user.id), card("another card"))
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.state.payment().unwrap().transaction_id,
        second.state.payment().unwrap().transaction_id
    );
    let payments = h
        .audit
        .snapshot()
        .await
        .into_iter()
        .filter(|e| e.action == AuditAction::PaymentSuccess)
        .count();
    assert_eq!(payments, 1);
}

#[tokio::test]
async fn test_payment_requires_label() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, dec!(1000), 10).await;
    let user = common::seed_user(&h.stores, "Asha Rao", "asha@example.com", Role::User).await;
    let booking = h
        .services
        .bookings
        .create_booking(request(user.id, package.id, 1, 0))
        .await
        .unwrap();

    let err = h
        .services
        .bookings
        .simulate_payment(booking.id, Actor::user(user.id), card("  ab  "))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Payment details are required");

    let stored = h.services.bookings.booking(booking.id, Actor::user(user.id)).await.unwrap();
    assert_eq!(stored.payment_status(), PaymentStatus::Pending);
}

#[tokio::test]
async fn test_payment_on_foreign_booking_is_rejected() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, dec!(1000), 10).await;
    let owner = common::seed_user(&h.stores, "Asha Rao", "asha@example.com", Role::User).await;
    let other = common::seed_user(&h.stores, "Ravi Kumar", "ravi@example.com", Role::User).await;
    let booking = h
        .services
        .bookings
        .create_booking(request(owner.id, package.id, 1, 0))
        .await
        .unwrap();

    let err = h
        .services
        .bookings
        .simulate_payment(booking.id, Actor::user(other.id), card("VISA 1111"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = h
        .services
        .bookings
        .booking(booking.id, Actor::user(other.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[tokio::test]
async fn test_payment_can_become_default() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, dec!(1000), 10).await;
    let user = common::seed_user(&h.stores, "Asha Rao", "asha@example.com", Role::User).await;
    let booking = h
        .services
        .bookings
        .create_booking(request(user.id, package.id, 1, 0))
        .await
        .unwrap();

    let mut payment = card(" HDFC NetBanking ");
    payment.method = PaymentMethod::NetBanking;
    payment.make_default = true;
    h.services
        .bookings
        .simulate_payment(booking.id, Actor::user(user.id), payment)
        .await
        .unwrap();

    let pref = h.services.bookings.payment_preference(user.id).await.unwrap();
    assert_eq!(pref.default_payment_method, Some(PaymentMethod::NetBanking));
    assert_eq!(pref.default_payment_label.as_deref(), Some("HDFC NetBanking"));

    assert!(matches!(
        h.services.bookings.payment_preference(Uuid::new_v4()).await,
        Err(TravelError::NotFoundError("User"))
    ));
}

#[tokio::test]
async fn test_confirm_requires_payment_and_admin() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, dec!(1000), 10).await;
    let user = common::seed_user(&h.stores, "Asha Rao", "asha@example.com", Role::User).await;
    let admin = common::seed_user(&h.stores, "Root Admin", "root@example.com", Role::Admin).await;
    let booking = h
        .services
        .bookings
        .create_booking(request(user.id, package.id, 1, 0))
        .await
        .unwrap();

    let err = h
        .services
        .bookings
        .confirm_booking(booking.id, Actor::admin(admin.id))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Only paid bookings can be confirmed");

    h.services
        .bookings
        .simulate_payment(booking.id, Actor::user(user.id), card("VISA 4242"))
        .await
        .unwrap();

    let err = h
        .services
        .bookings
        .confirm_booking(booking.id, Actor::user(user.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let err = h
        .services
        .bookings
        .confirm_booking(Uuid::new_v4(), Actor::admin(admin.id))
        .await
        .unwrap_err();
    assert!(matches!(err, TravelError::NotFoundError("Booking")));
}

#[tokio::test]
async fn test_confirm_twice_is_a_noop() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, dec!(1000), 10).await;
    let user = common::seed_user(&h.stores, "Asha Rao", "asha@example.com", Role::User).await;
    let admin = Actor::admin(Uuid::new_v4());
    let booking = h
        .services
        .bookings
        .create_booking(request(user.id, package.id, 1, 0))
        .await
        .unwrap();
    h.services
        .bookings
        .simulate_payment(booking.id, Actor::user(user.id), card("VISA 4242"))
        .await
        .unwrap();

    let first = h.services.bookings.confirm_booking(booking.id, admin).await.unwrap();
    let second = h.services.bookings.confirm_booking(booking.id, admin).await.unwrap();
    assert_eq!(first, second);

    let entries = h.audit.snapshot().await;
    let confirms: Vec<_> = entries
        .iter()
        .filter(|e| e.action == AuditAction::ConfirmBooking)
        .collect();
    assert_eq!(confirms.len(), 1);
    // No admin record exists, so the label falls back to Unknown.
    assert_eq!(confirms[0].performed_by, format!("ADMIN:Unknown ({})", admin.user_id));
}

#[tokio::test]
async fn test_booking_listings() {
    let h = common::harness();
    let package = common::seed_package(&h.stores, dec!(1000), 20).await;
    let asha = common::seed_user(&h.stores, "Asha Rao", "asha@example.com", Role::User).await;
    let ravi = common::seed_user(&h.stores, "Ravi Kumar", "ravi@example.com", Role::User).await;
    let admin = common::seed_user(&h.stores, "Root Admin", "root@example.com", Role::Admin).await;

    let mut asha_bookings = Vec::new();
    for _ in 0..3 {
        let booking = h
            .services
            .bookings
            .create_booking(request(asha.id, package.id, 1, 0))
            .await
            .unwrap();
        asha_bookings.push(booking);
    }
    h.services
        .bookings
        .create_booking(request(ravi.id, package.id, 2, 0))
        .await
        .unwrap();
    h.services
        .bookings
        .simulate_payment(asha_bookings[0].id, Actor::user(asha.id), card("VISA 4242"))
        .await
        .unwrap();

    let mine = h
        .services
        .bookings
        .my_bookings(asha.id, BookingFilter::default(), PageRequest::new(1, 2).unwrap())
        .await
        .unwrap();
    assert_eq!(mine.total, 3);
    assert_eq!(mine.items.len(), 2);
    assert_eq!(mine.total_pages, 2);
    assert!(mine.items.iter().all(|b| b.user_id == asha.id));

    let paid_filter = BookingFilter {
        payment_status: Some(PaymentStatus::Success),
        booking_status: None,
    };
    let paid = h
        .services
        .bookings
        .my_bookings(asha.id, paid_filter, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(paid.total, 1);
    assert_eq!(paid.items[0].id, asha_bookings[0].id);

    let all = h
        .services
        .bookings
        .all_bookings(Actor::admin(admin.id), BookingFilter::default(), PageRequest::default())
        .await
        .unwrap();
    assert_eq!(all.total, 4);

    let err = h
        .services
        .bookings
        .all_bookings(Actor::user(asha.id), BookingFilter::default(), PageRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);

    let details = h
        .services
        .bookings
        .booking_for_admin(asha_bookings[0].id, Actor::admin(admin.id))
        .await
        .unwrap();
    assert_eq!(details.booking.user_name.as_deref(), Some("Asha Rao"));
    assert_eq!(details.package.map(|p| p.id), Some(package.id));
}
