//! Integration tests for the model delegates
//!
//! Every test runs against a fresh schema-synced SQLite file.

mod common;

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use common::{create_company, create_membership, create_team, create_user, day, test_db};
use leave_client::{ClientError, Database};
use leave_client::models::{
    Company, CompanyCreateInput, CompanyField, CompanyInclude, CompanyUpdateInput,
    CompanyWhereInput, CompanyWhereUniqueInput, LeaveBalanceCreateInput, LeaveBalanceField,
    LeaveBalanceUpdateInput, LeaveBalanceWhereUniqueInput, LeaveCreateInput, LeaveField,
    LeaveInclude, LeaveStatus, LeaveType, LeaveUpdateInput, LeaveWhereInput, MembershipField,
    MembershipInclude, MembershipRole, MembershipWhereInput, User, UserCreateInput, UserField,
    UserInclude, UserUpdateInput, UserWhereInput, UserWhereUniqueInput,
};
use leave_client::orm::{
    AggregateArgs, Comparison, CountArgs, CreateArgs, CreateManyArgs, DeleteArgs, DeleteManyArgs,
    EnumFilter, FindManyArgs, FindUniqueArgs, FloatFilter, GroupByArgs, GroupOrderBy, GroupTarget,
    Having, ListRelationFilter, NullsOrder, NumberUpdate, OrderBy, RelationFilter, SqlValue,
    StringFilter, UpdateArgs, UpdateManyArgs, UpsertArgs,
};

// ============================================================================
// Create / read
// ============================================================================

mod create_and_find {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_create_fills_id_and_timestamps() {
        let db = test_db().await;
        let user = create_user(&db, "Ada", "ada@example.com").await;

        assert!(!user.id.is_empty());
        assert!(!user.email_verified);
        assert_eq!(user.image, None);
        assert_eq!(user.created_at, user.updated_at);
    }

    #[tokio::test]
    async fn test_create_keeps_explicit_id() {
        let db = test_db().await;
        let mut data = UserCreateInput::new("Ada", "ada@example.com");
        data.id = Some("user-1".to_string());
        let user = db.users().create(CreateArgs::new(data)).await.unwrap();
        assert_eq!(user.id, "user-1");
    }

    #[tokio::test]
    async fn test_find_unique_by_each_selector() {
        let db = test_db().await;
        let user = create_user(&db, "Ada", "ada@example.com").await;

        let by_id = db
            .users()
            .find_unique(FindUniqueArgs::new(UserWhereUniqueInput::Id(user.id.clone())))
            .await
            .unwrap();
        let by_email = db
            .users()
            .find_unique(FindUniqueArgs::new(UserWhereUniqueInput::Email(
                "ada@example.com".to_string(),
            )))
            .await
            .unwrap();
        assert_eq!(by_id.as_ref(), Some(&user));
        assert_eq!(by_email, Some(user));

        let missing = db
            .users()
            .find_unique(FindUniqueArgs::new(UserWhereUniqueInput::Email(
                "nobody@example.com".to_string(),
            )))
            .await
            .unwrap();
        assert_eq!(missing, None);
    }

    #[tokio::test]
    async fn test_or_throw_variants() {
        let db = test_db().await;
        let err = db
            .users()
            .find_unique_or_throw(FindUniqueArgs::new(UserWhereUniqueInput::Id("x".into())))
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::RecordNotFound { model: "User", .. });
        assert_eq!(err.code(), "P2025");

        let err = db
            .companies()
            .find_first_or_throw(FindManyArgs::new())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let db = test_db().await;
        create_user(&db, "Ada", "ada@example.com").await;

        let err = db
            .users()
            .create(CreateArgs::new(UserCreateInput::new("Other", "ada@example.com")))
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::UniqueConstraint { model: "User", ref fields } => {
            assert_eq!(fields, &vec!["email".to_string()]);
        });
        assert_eq!(err.code(), "P2002");
    }

    #[tokio::test]
    async fn test_create_many_is_all_or_nothing() {
        let db = test_db().await;
        let data = vec![
            UserCreateInput::new("A", "a@example.com"),
            UserCreateInput::new("B", "b@example.com"),
            UserCreateInput::new("A again", "a@example.com"),
        ];
        let err = db
            .users()
            .create_many(CreateManyArgs::new(data))
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::UniqueConstraint { .. });
        assert_eq!(db.users().count(CountArgs::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_create_many_skip_duplicates() {
        let db = test_db().await;
        create_user(&db, "A", "a@example.com").await;

        let data = vec![
            UserCreateInput::new("A again", "a@example.com"),
            UserCreateInput::new("B", "b@example.com"),
        ];
        let payload = db
            .users()
            .create_many(CreateManyArgs::new(data.clone()).skip_duplicates())
            .await
            .unwrap();
        assert_eq!(payload.count, 1);

        let created = db
            .users()
            .create_many_and_return(
                CreateManyArgs::new(vec![
                    UserCreateInput::new("B again", "b@example.com"),
                    UserCreateInput::new("C", "c@example.com"),
                ])
                .skip_duplicates(),
            )
            .await
            .unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].email, "c@example.com");
    }
}

// ============================================================================
// Filters
// ============================================================================

mod filters {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seed_users(db: &Database) {
        for (name, email) in [
            ("Ada Lovelace", "ada@example.com"),
            ("Alan Turing", "alan@example.com"),
            ("Grace Hopper", "grace@navy.test"),
            ("100%_real", "percent@example.com"),
        ] {
            create_user(db, name, email).await;
        }
    }

    async fn names(db: &Database, filter: UserWhereInput) -> Vec<String> {
        db.users()
            .find_many(
                FindManyArgs::new()
                    .filter(filter)
                    .order_by(OrderBy::asc(UserField::Name)),
            )
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect()
    }

    #[tokio::test]
    async fn test_string_operators() {
        let db = test_db().await;
        seed_users(&db).await;

        let filter = UserWhereInput {
            email: Some(StringFilter::ends_with("@example.com")),
            ..Default::default()
        };
        assert_eq!(
            names(&db, filter).await,
            vec!["100%_real", "Ada Lovelace", "Alan Turing"]
        );

        let filter = UserWhereInput {
            name: Some(StringFilter::starts_with("A")),
            ..Default::default()
        };
        assert_eq!(names(&db, filter).await, vec!["Ada Lovelace", "Alan Turing"]);

        // `%` and `_` are not wildcards
        let filter = UserWhereInput {
            name: Some(StringFilter::contains("%_")),
            ..Default::default()
        };
        assert_eq!(names(&db, filter).await, vec!["100%_real"]);
    }

    #[tokio::test]
    async fn test_insensitive_mode() {
        let db = test_db().await;
        seed_users(&db).await;

        let filter = UserWhereInput {
            email: Some(StringFilter::eq("GRACE@NAVY.TEST").insensitive()),
            ..Default::default()
        };
        assert_eq!(names(&db, filter).await, vec!["Grace Hopper"]);

        let filter = UserWhereInput {
            email: Some(StringFilter::eq("GRACE@NAVY.TEST")),
            ..Default::default()
        };
        assert!(names(&db, filter).await.is_empty());
    }

    #[tokio::test]
    async fn test_and_or_not() {
        let db = test_db().await;
        seed_users(&db).await;

        let filter = UserWhereInput {
            or: Some(vec![
                UserWhereInput {
                    name: Some(StringFilter::starts_with("Grace")),
                    ..Default::default()
                },
                UserWhereInput {
                    name: Some(StringFilter::starts_with("Alan")),
                    ..Default::default()
                },
            ]),
            not: vec![UserWhereInput {
                email: Some(StringFilter::contains("navy")),
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(names(&db, filter).await, vec!["Alan Turing"]);

        let nothing = UserWhereInput {
            or: Some(Vec::new()),
            ..Default::default()
        };
        assert!(names(&db, nothing).await.is_empty());
    }

    #[tokio::test]
    async fn test_null_checks_and_in_list() {
        let db = test_db().await;
        seed_users(&db).await;
        db.users()
            .update(UpdateArgs::new(
                UserWhereUniqueInput::Email("ada@example.com".into()),
                UserUpdateInput {
                    image: Some(Some("ada.png".into())),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();

        let with_image = UserWhereInput {
            image: Some(StringFilter::is_not_null()),
            ..Default::default()
        };
        assert_eq!(names(&db, with_image).await, vec!["Ada Lovelace"]);

        let listed = UserWhereInput {
            email: Some(StringFilter::in_list(["alan@example.com", "grace@navy.test"])),
            ..Default::default()
        };
        assert_eq!(names(&db, listed).await, vec!["Alan Turing", "Grace Hopper"]);

        let empty_in = UserWhereInput {
            email: Some(StringFilter::in_list(Vec::<String>::new())),
            ..Default::default()
        };
        assert!(names(&db, empty_in).await.is_empty());
    }

    #[tokio::test]
    async fn test_list_relation_filters() {
        let db = test_db().await;
        let team = create_team(&db).await;
        create_user(&db, "Loner", "loner@example.com").await;

        let managers = UserWhereInput {
            memberships: Some(ListRelationFilter::some(MembershipWhereInput {
                role: Some(EnumFilter::eq(MembershipRole::Manager)),
                ..Default::default()
            })),
            ..Default::default()
        };
        assert_eq!(names(&db, managers).await, vec![team.manager.name.clone()]);

        let unattached = UserWhereInput {
            memberships: Some(ListRelationFilter::none(MembershipWhereInput::default())),
            ..Default::default()
        };
        assert_eq!(names(&db, unattached).await, vec!["Loner"]);

        // Vacuously true for users without memberships
        let only_employees = UserWhereInput {
            memberships: Some(ListRelationFilter::every(MembershipWhereInput {
                role: Some(EnumFilter::eq(MembershipRole::Employee)),
                ..Default::default()
            })),
            ..Default::default()
        };
        assert_eq!(
            names(&db, only_employees).await,
            vec![team.employee.name.clone(), "Loner".to_string()]
        );
    }

    #[tokio::test]
    async fn test_every_treats_null_as_failing() {
        let db = test_db().await;
        let team = create_team(&db).await;
        for (start, reason) in [(1, Some("Holidays")), (10, None)] {
            let mut data = LeaveCreateInput::new(
                &team.employee_membership.id,
                LeaveType::Sick,
                day(2025, 6, start),
                day(2025, 6, start),
                1.0,
            );
            if let Some(reason) = reason {
                data = data.reason(reason);
            }
            db.leaves().create(CreateArgs::new(data)).await.unwrap();
        }

        let all_holidays = MembershipWhereInput {
            leaves: Some(ListRelationFilter::every(LeaveWhereInput {
                reason: Some(StringFilter::eq("Holidays")),
                ..Default::default()
            })),
            ..Default::default()
        };
        let matched: Vec<String> = db
            .memberships()
            .find_many(FindManyArgs::new().filter(all_holidays))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        // The employee's leave without a reason fails the condition
        assert_eq!(matched, vec![team.manager_membership.id.clone()]);
    }
}

// ============================================================================
// Ordering and pagination
// ============================================================================

mod pagination {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seed_companies(db: &Database) {
        for name in ["C", "A", "E", "B", "D"] {
            create_company(db, name, &name.to_lowercase()).await;
        }
    }

    fn by_name() -> FindManyArgs<Company> {
        FindManyArgs::new().order_by(OrderBy::asc(CompanyField::Name))
    }

    fn names(companies: Vec<Company>) -> Vec<String> {
        companies.into_iter().map(|c| c.name).collect()
    }

    #[tokio::test]
    async fn test_skip_take() {
        let db = test_db().await;
        seed_companies(&db).await;

        let page = db.companies().find_many(by_name().skip(1).take(2)).await.unwrap();
        assert_eq!(names(page), vec!["B", "C"]);

        let desc = db
            .companies()
            .find_many(
                FindManyArgs::new()
                    .order_by(OrderBy::desc(CompanyField::Name))
                    .take(2),
            )
            .await
            .unwrap();
        assert_eq!(names(desc), vec!["E", "D"]);
    }

    #[tokio::test]
    async fn test_negative_skip_is_rejected() {
        let db = test_db().await;
        let err = db.companies().find_many(by_name().skip(-1)).await.unwrap_err();
        assert_matches!(err, ClientError::Validation { .. });
    }

    #[tokio::test]
    async fn test_cursor_forward_and_backward() {
        let db = test_db().await;
        seed_companies(&db).await;
        let cursor = || CompanyWhereUniqueInput::Slug("c".to_string());

        let forward = db
            .companies()
            .find_many(by_name().cursor(cursor()).take(2))
            .await
            .unwrap();
        assert_eq!(names(forward), vec!["C", "D"]);

        let after = db
            .companies()
            .find_many(by_name().cursor(cursor()).skip(1).take(2))
            .await
            .unwrap();
        assert_eq!(names(after), vec!["D", "E"]);

        let backward = db
            .companies()
            .find_many(by_name().cursor(cursor()).take(-2))
            .await
            .unwrap();
        assert_eq!(names(backward), vec!["B", "C"]);

        let gone = db
            .companies()
            .find_many(by_name().cursor(CompanyWhereUniqueInput::Slug("zz".into())))
            .await
            .unwrap();
        assert!(gone.is_empty());
    }

    /// Users "a".."e" ordered by image: c=z, a=m, e=m, b and d without one
    async fn seed_avatars(db: &Database) {
        for (id, image) in [
            ("a", Some("m.png")),
            ("b", None),
            ("c", Some("z.png")),
            ("d", None),
            ("e", Some("m.png")),
        ] {
            db.users()
                .create(CreateArgs::new(UserCreateInput {
                    id: Some(id.to_string()),
                    image: image.map(str::to_string),
                    ..UserCreateInput::new(id, format!("{}@example.com", id))
                }))
                .await
                .unwrap();
        }
    }

    async fn user_ids(db: &Database, args: FindManyArgs<User>) -> Vec<String> {
        db.users()
            .find_many(args)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.id)
            .collect()
    }

    fn at(id: &str) -> UserWhereUniqueInput {
        UserWhereUniqueInput::Id(id.to_string())
    }

    #[tokio::test]
    async fn test_cursor_on_nullable_column_descending() {
        let db = test_db().await;
        seed_avatars(&db).await;
        let by_image = || FindManyArgs::new().order_by(OrderBy::desc(UserField::Image));

        assert_eq!(user_ids(&db, by_image()).await, vec!["c", "a", "e", "b", "d"]);
        assert_eq!(
            user_ids(&db, by_image().cursor(at("a"))).await,
            vec!["a", "e", "b", "d"]
        );
        assert_eq!(user_ids(&db, by_image().cursor(at("b"))).await, vec!["b", "d"]);
        assert_eq!(
            user_ids(&db, by_image().cursor(at("b")).take(-3)).await,
            vec!["a", "e", "b"]
        );
        assert_eq!(
            user_ids(&db, by_image().cursor(at("e")).take(-2)).await,
            vec!["a", "e"]
        );
    }

    #[tokio::test]
    async fn test_cursor_on_nullable_column_ascending() {
        let db = test_db().await;
        seed_avatars(&db).await;
        let by_image = || FindManyArgs::new().order_by(OrderBy::asc(UserField::Image));

        assert_eq!(
            user_ids(&db, by_image().cursor(at("b"))).await,
            vec!["b", "d", "a", "e", "c"]
        );
        assert_eq!(user_ids(&db, by_image().cursor(at("d")).take(2)).await, vec!["d", "a"]);

        let nulls_last = FindManyArgs::new()
            .order_by(OrderBy::asc(UserField::Image).nulls(NullsOrder::Last))
            .cursor(at("e"));
        assert_eq!(user_ids(&db, nulls_last).await, vec!["e", "c", "b", "d"]);
    }

    #[tokio::test]
    async fn test_find_first_negative_take_is_last() {
        let db = test_db().await;
        seed_companies(&db).await;

        let first = db.companies().find_first(by_name()).await.unwrap().unwrap();
        let last = db.companies().find_first(by_name().take(-1)).await.unwrap().unwrap();
        assert_eq!(first.name, "A");
        assert_eq!(last.name, "E");
    }

    #[tokio::test]
    async fn test_distinct_keeps_first_per_value() {
        let db = test_db().await;
        let team = create_team(&db).await;
        let extra = create_user(&db, "Dan", "dan@acme.test").await;
        create_membership(&db, &extra, &team.company, MembershipRole::Employee).await;

        let roles: Vec<MembershipRole> = db
            .memberships()
            .find_many(
                FindManyArgs::new()
                    .order_by(OrderBy::asc(MembershipField::Role))
                    .distinct(MembershipField::Role),
            )
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, vec![MembershipRole::Employee, MembershipRole::Manager]);

        let count = db
            .memberships()
            .count(CountArgs::default().skip(1).take(5))
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}

// ============================================================================
// Updates and deletes
// ============================================================================

mod writes {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_update_touches_updated_at_only_when_writing() {
        let db = test_db().await;
        let company = create_company(&db, "Acme", "acme").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let unchanged = db
            .companies()
            .update(UpdateArgs::new(
                CompanyWhereUniqueInput::Id(company.id.clone()),
                CompanyUpdateInput::default(),
            ))
            .await
            .unwrap();
        assert_eq!(unchanged.updated_at, company.updated_at);

        let renamed = db
            .companies()
            .update(UpdateArgs::new(
                CompanyWhereUniqueInput::Id(company.id.clone()),
                CompanyUpdateInput {
                    name: Some("Acme Corp".into()),
                    logo: Some(Some("logo.svg".into())),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();
        assert_eq!(renamed.name, "Acme Corp");
        assert_eq!(renamed.logo.as_deref(), Some("logo.svg"));
        assert!(renamed.updated_at > company.updated_at);
        assert_eq!(renamed.created_at, company.created_at);

        let cleared = db
            .companies()
            .update(UpdateArgs::new(
                CompanyWhereUniqueInput::Slug("acme".into()),
                CompanyUpdateInput {
                    logo: Some(None),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();
        assert_eq!(cleared.logo, None);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let db = test_db().await;
        let err = db
            .companies()
            .update(UpdateArgs::new(
                CompanyWhereUniqueInput::Slug("nope".into()),
                CompanyUpdateInput {
                    name: Some("x".into()),
                    ..Default::default()
                },
            ))
            .await
            .unwrap_err();
        assert_matches!(
            err,
            ClientError::RecordNotFound {
                model: "Company",
                operation: "update"
            }
        );
    }

    #[tokio::test]
    async fn test_atomic_number_updates() {
        let db = test_db().await;
        let team = create_team(&db).await;
        let balance = db
            .leave_balances()
            .create(CreateArgs::new(
                LeaveBalanceCreateInput::new(&team.employee_membership.id, LeaveType::Paid)
                    .remaining(10.0),
            ))
            .await
            .unwrap();

        let payload = db
            .leave_balances()
            .update_many(UpdateManyArgs::new(
                Default::default(),
                LeaveBalanceUpdateInput {
                    remaining: Some(NumberUpdate::Multiply(1.5)),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();
        assert_eq!(payload.count, 1);

        let after = db
            .leave_balances()
            .update(UpdateArgs::new(
                LeaveBalanceWhereUniqueInput::Id(balance.id),
                LeaveBalanceUpdateInput::decrement(2.5),
            ))
            .await
            .unwrap();
        assert_eq!(after.remaining, 12.5);
    }

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let db = test_db().await;
        let args = |name: &str| {
            UpsertArgs::<Company>::new(
                CompanyWhereUniqueInput::Slug("acme".into()),
                CompanyCreateInput::new(name, "acme"),
                CompanyUpdateInput {
                    name: Some(name.to_string()),
                    ..Default::default()
                },
            )
        };

        let created = db.companies().upsert(args("Acme")).await.unwrap();
        let updated = db.companies().upsert(args("Acme Corp")).await.unwrap();
        assert_eq!(created.id, updated.id);
        assert_eq!(updated.name, "Acme Corp");
        assert_eq!(db.companies().count(CountArgs::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_returns_record_with_relations() {
        let db = test_db().await;
        let team = create_team(&db).await;

        let deleted = db
            .companies()
            .delete(
                DeleteArgs::new(CompanyWhereUniqueInput::Id(team.company.id.clone()))
                    .include(CompanyInclude::default().memberships(FindManyArgs::new())),
            )
            .await
            .unwrap();
        assert_eq!(deleted.memberships.map(|m| m.len()), Some(2));

        let err = db
            .companies()
            .delete(DeleteArgs::new(CompanyWhereUniqueInput::Id(team.company.id)))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_many_counts_rows() {
        let db = test_db().await;
        for (name, email) in [("A", "a@x.test"), ("B", "b@y.test"), ("C", "c@x.test")] {
            create_user(&db, name, email).await;
        }

        let payload = db
            .users()
            .delete_many(DeleteManyArgs::new(UserWhereInput {
                email: Some(StringFilter::ends_with("@x.test")),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(payload.count, 2);
        assert_eq!(db.users().count(CountArgs::default()).await.unwrap(), 1);
    }
}

// ============================================================================
// Relation loading
// ============================================================================

mod include {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_include_over_many_parents() {
        let db = test_db().await;
        let team = create_team(&db).await;
        let extra: Vec<UserCreateInput> = (0..1000)
            .map(|i| UserCreateInput::new(format!("User {}", i), format!("user{}@example.com", i)))
            .collect();
        db.users().create_many(CreateManyArgs::new(extra)).await.unwrap();

        let memberships = FindManyArgs::new()
            .include(MembershipInclude::default().company(CompanyInclude::default()));
        let users = db
            .users()
            .find_many(FindManyArgs::new().include(UserInclude::default().memberships(memberships)))
            .await
            .unwrap();
        assert_eq!(users.len(), 1002);

        let mut members: Vec<(String, String)> = users
            .iter()
            .flat_map(|u| u.memberships.as_deref().unwrap_or_default())
            .map(|m| {
                let company = m.company.as_ref().map(|c| c.slug.clone()).unwrap_or_default();
                (m.user_id.clone(), company)
            })
            .collect();
        members.sort();
        let mut expected = vec![
            (team.manager.id.clone(), "acme".to_string()),
            (team.employee.id.clone(), "acme".to_string()),
        ];
        expected.sort();
        assert_eq!(members, expected);
        assert!(users.iter().all(|u| u.memberships.is_some()));
    }

    #[tokio::test]
    async fn test_nested_include() {
        let db = test_db().await;
        let team = create_team(&db).await;
        common::create_balance(&db, &team.employee_membership, LeaveType::Paid, 25.0).await;
        common::create_balance(&db, &team.employee_membership, LeaveType::Rtt, 10.0).await;

        let user = db
            .users()
            .find_unique_or_throw(
                FindUniqueArgs::new(UserWhereUniqueInput::Id(team.employee.id.clone())).include(
                    UserInclude::default().memberships(
                        FindManyArgs::new().include(
                            MembershipInclude::default()
                                .company(CompanyInclude::default())
                                .balances(
                                    FindManyArgs::new()
                                        .order_by(OrderBy::desc(LeaveBalanceField::Remaining)),
                                ),
                        ),
                    ),
                ),
            )
            .await
            .unwrap();

        let memberships = user.memberships.expect("memberships loaded");
        assert_eq!(memberships.len(), 1);
        let membership = &memberships[0];
        assert_eq!(
            membership.company.as_ref().map(|c| c.slug.as_str()),
            Some("acme")
        );
        let remaining: Vec<f64> = membership
            .balances
            .as_ref()
            .expect("balances loaded")
            .iter()
            .map(|b| b.remaining)
            .collect();
        assert_eq!(remaining, vec![25.0, 10.0]);
        assert!(membership.leaves.is_none());
    }

    #[tokio::test]
    async fn test_include_filter_and_optional_relation() {
        let db = test_db().await;
        let team = create_team(&db).await;
        db.leaves()
            .create(CreateArgs::new(LeaveCreateInput::new(
                &team.employee_membership.id,
                LeaveType::Sick,
                day(2025, 3, 3),
                day(2025, 3, 4),
                2.0,
            )))
            .await
            .unwrap();

        let company = db
            .companies()
            .find_unique_or_throw(
                FindUniqueArgs::new(CompanyWhereUniqueInput::Slug("acme".into())).include(
                    CompanyInclude::default().memberships(FindManyArgs::new().filter(
                        MembershipWhereInput {
                            role: Some(EnumFilter::eq(MembershipRole::Manager)),
                            ..Default::default()
                        },
                    )),
                ),
            )
            .await
            .unwrap();
        let memberships = company.memberships.unwrap();
        assert_eq!(memberships.len(), 1);
        assert_eq!(memberships[0].user_id, team.manager.id);

        let leaves = db
            .leaves()
            .find_many(
                FindManyArgs::new().include(
                    LeaveInclude::default()
                        .membership(MembershipInclude::default().user(UserInclude::default()))
                        .manager(UserInclude::default()),
                ),
            )
            .await
            .unwrap();
        assert_eq!(leaves.len(), 1);
        let leave = &leaves[0];
        assert!(leave.manager.is_none());
        let owner = leave.membership.as_ref().and_then(|m| m.user.as_ref()).unwrap();
        assert_eq!(owner.email, "chloe@acme.test");
    }
}

// ============================================================================
// Aggregates
// ============================================================================

mod aggregates {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn seed_leaves(db: &Database) {
        let team = create_team(db).await;
        let leaves = [
            (LeaveType::Paid, 1, 3.0, LeaveStatus::Approved),
            (LeaveType::Paid, 10, 2.0, LeaveStatus::Pending),
            (LeaveType::Sick, 20, 0.5, LeaveStatus::Approved),
        ];
        for (leave_type, start, days, status) in leaves {
            db.leaves()
                .create(CreateArgs::new(
                    LeaveCreateInput::new(
                        &team.employee_membership.id,
                        leave_type,
                        day(2025, 6, start),
                        day(2025, 6, start + 2),
                        days,
                    )
                    .status(status),
                ))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_aggregate() {
        let db = test_db().await;
        seed_leaves(&db).await;

        let result = db
            .leaves()
            .aggregate(
                AggregateArgs::new(LeaveWhereInput::default())
                    .count_all()
                    .sum(LeaveField::Days)
                    .avg(LeaveField::Days)
                    .min(LeaveField::Days)
                    .max(LeaveField::StartDate)
                    .count(LeaveField::Reason),
            )
            .await
            .unwrap();
        assert_eq!(result.count_all, Some(3));
        assert_eq!(result.sum.get(&LeaveField::Days), Some(&Some(5.5)));
        assert_eq!(result.min.get(&LeaveField::Days), Some(&SqlValue::Float(0.5)));
        assert_eq!(result.count.get(&LeaveField::Reason), Some(&0));
        let avg = result.avg[&LeaveField::Days].unwrap();
        assert!((avg - 5.5 / 3.0).abs() < 1e-9);
        assert_matches!(result.max.get(&LeaveField::StartDate), Some(SqlValue::String(s)) => {
            assert!(s.starts_with("2025-06-20"));
        });
    }

    #[tokio::test]
    async fn test_aggregate_windows_with_skip_and_take() {
        let db = test_db().await;
        seed_leaves(&db).await;
        let by_days = || {
            AggregateArgs::new(LeaveWhereInput::default())
                .order_by(OrderBy::asc(LeaveField::Days))
                .count_all()
                .sum(LeaveField::Days)
        };

        let first_two = db.leaves().aggregate(by_days().take(2)).await.unwrap();
        assert_eq!(first_two.count_all, Some(2));
        assert_eq!(first_two.sum.get(&LeaveField::Days), Some(&Some(2.5)));

        let middle = db.leaves().aggregate(by_days().skip(1).take(1)).await.unwrap();
        assert_eq!(middle.sum.get(&LeaveField::Days), Some(&Some(2.0)));

        // A negative take keeps the last rows of the ordering
        let last_two = db.leaves().aggregate(by_days().take(-2)).await.unwrap();
        assert_eq!(last_two.count_all, Some(2));
        assert_eq!(last_two.sum.get(&LeaveField::Days), Some(&Some(5.0)));

        let before_last = db.leaves().aggregate(by_days().skip(1).take(-1)).await.unwrap();
        assert_eq!(before_last.sum.get(&LeaveField::Days), Some(&Some(2.0)));
    }

    #[tokio::test]
    async fn test_count_with_negative_take() {
        let db = test_db().await;
        seed_leaves(&db).await;

        let leaves = db.leaves();
        assert_eq!(leaves.count(CountArgs::default().take(-2)).await.unwrap(), 2);
        assert_eq!(leaves.count(CountArgs::default().skip(2).take(-5)).await.unwrap(), 1);
        assert_eq!(leaves.count(CountArgs::default().take(-10)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_aggregate_on_empty_set_and_bad_field() {
        let db = test_db().await;
        let result = db
            .leaves()
            .aggregate(
                AggregateArgs::new(LeaveWhereInput::default())
                    .count_all()
                    .sum(LeaveField::Days),
            )
            .await
            .unwrap();
        assert_eq!(result.count_all, Some(0));
        assert_eq!(result.sum.get(&LeaveField::Days), Some(&None));

        let err = db
            .leaves()
            .aggregate(AggregateArgs::new(LeaveWhereInput::default()).avg(LeaveField::Reason))
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Validation { model: "Leave", .. });
    }

    #[tokio::test]
    async fn test_group_by_with_having_and_order() {
        let db = test_db().await;
        seed_leaves(&db).await;

        let rows = db
            .leaves()
            .group_by(
                GroupByArgs::new([LeaveField::LeaveType])
                    .count_all()
                    .sum(LeaveField::Days)
                    .order_by(GroupOrderBy::desc(GroupTarget::Sum(LeaveField::Days))),
            )
            .await
            .unwrap();
        let summary: Vec<(SqlValue, Option<i64>, Option<f64>)> = rows
            .iter()
            .map(|row| {
                (
                    row.keys[&LeaveField::LeaveType].clone(),
                    row.aggregates.count_all,
                    row.aggregates.sum[&LeaveField::Days],
                )
            })
            .collect();
        assert_eq!(
            summary,
            vec![
                (SqlValue::String("PAID".into()), Some(2), Some(5.0)),
                (SqlValue::String("SICK".into()), Some(1), Some(0.5)),
            ]
        );

        let approved_heavy = db
            .leaves()
            .group_by(
                GroupByArgs::new([LeaveField::Status])
                    .filter(LeaveWhereInput {
                        days: Some(FloatFilter::gte(1.0)),
                        ..Default::default()
                    })
                    .count_all()
                    .having(Having::new(
                        GroupTarget::CountAll,
                        Comparison::Gte,
                        SqlValue::Int(1),
                    )),
            )
            .await
            .unwrap();
        let statuses: Vec<&SqlValue> = approved_heavy
            .iter()
            .map(|row| &row.keys[&LeaveField::Status])
            .collect();
        assert_eq!(
            statuses,
            vec![
                &SqlValue::String("APPROVED".into()),
                &SqlValue::String("PENDING".into())
            ]
        );
    }

    #[tokio::test]
    async fn test_group_by_rejects_unknown_order_field() {
        let db = test_db().await;
        let err = db
            .leaves()
            .group_by(
                GroupByArgs::new([LeaveField::LeaveType])
                    .order_by(GroupOrderBy::asc(GroupTarget::Field(LeaveField::Status))),
            )
            .await
            .unwrap_err();
        assert_matches!(err, ClientError::Validation { .. });
    }

    #[tokio::test]
    async fn test_update_many_by_enum_filter() {
        let db = test_db().await;
        seed_leaves(&db).await;

        let payload = db
            .leaves()
            .update_many(UpdateManyArgs::new(
                LeaveWhereInput {
                    status: Some(EnumFilter::eq(LeaveStatus::Pending)),
                    ..Default::default()
                },
                LeaveUpdateInput {
                    status: Some(LeaveStatus::Canceled),
                    ..Default::default()
                },
            ))
            .await
            .unwrap();
        assert_eq!(payload.count, 1);

        let canceled = db
            .leaves()
            .count(CountArgs::new(LeaveWhereInput {
                status: Some(EnumFilter::eq(LeaveStatus::Canceled)),
                ..Default::default()
            }))
            .await
            .unwrap();
        assert_eq!(canceled, 1);
    }
}

#[tokio::test]
async fn test_company_filter_by_member_email() {
    let db = test_db().await;
    create_team(&db).await;
    create_company(&db, "Empty", "empty").await;

    let companies = db
        .companies()
        .find_many(FindManyArgs::new().filter(CompanyWhereInput {
            memberships: Some(ListRelationFilter::some(MembershipWhereInput {
                user: Some(RelationFilter::is(UserWhereInput {
                    email: Some(StringFilter::eq("chloe@acme.test")),
                    ..Default::default()
                })),
                ..Default::default()
            })),
            ..Default::default()
        }))
        .await
        .unwrap();
    assert_eq!(companies.len(), 1);
    assert_eq!(companies[0].slug, "acme");
}
