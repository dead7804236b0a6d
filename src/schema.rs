// Diesel table definitions. Kept in sync with the DDL in
// `repository::pool::SCHEMA_SQL`.

diesel::table! {
    categories (id) {
        id -> Integer,
        name -> Text,
        slug -> Text,
        description -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    articles (id) {
        id -> Integer,
        element_guid -> Nullable<Text>,
        title -> Text,
        slug -> Nullable<Text>,
        excerpt -> Nullable<Text>,
        content -> Nullable<Text>,
        image_data -> Nullable<Text>,
        published_url -> Text,
        published_url_en -> Nullable<Text>,
        k5a_url -> Nullable<Text>,
        site_alias -> Nullable<Text>,
        instance -> Nullable<Text>,
        section -> Text,
        category_id -> Nullable<Integer>,
        is_home -> Bool,
        display_order -> Integer,
        layout_type -> Nullable<Text>,
        grid_size -> Nullable<Integer>,
        layout_data -> Nullable<Text>,
        is_paywall -> Bool,
        paywall_class -> Nullable<Text>,
        is_featured -> Bool,
        is_temp -> Bool,
        article_type -> Nullable<Text>,
        position -> Nullable<Integer>,
        language -> Text,
        original_language -> Nullable<Text>,
        canonical_id -> Nullable<Integer>,
        published_date -> Nullable<Text>,
        crawled_at -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    article_details (id) {
        id -> Integer,
        published_url -> Text,
        language -> Text,
        element_guid -> Nullable<Text>,
        content_blocks -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    crawl_logs (id) {
        id -> Integer,
        crawl_type -> Text,
        section -> Nullable<Text>,
        status -> Text,
        articles_crawled -> Integer,
        articles_created -> Integer,
        articles_updated -> Integer,
        errors -> Nullable<Text>,
        started_at -> Text,
        completed_at -> Nullable<Text>,
    }
}

diesel::table! {
    users (id) {
        id -> Integer,
        email -> Text,
        subscriber_number -> Nullable<Text>,
        password_hash -> Nullable<Text>,
        is_active -> Bool,
    }
}

diesel::joinable!(articles -> categories (category_id));

diesel::allow_tables_to_appear_in_same_query!(
    categories,
    articles,
    article_details,
    crawl_logs,
    users,
);
