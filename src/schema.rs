// Cartesia schema - Roadmap graph tables for Diesel ORM

diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        email -> Text,
        password_hash -> Nullable<Text>,
        google_id -> Nullable<Text>,
        avatar_url -> Nullable<Text>,
        bio -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    roadmaps (id) {
        id -> Integer,
        title -> Text,
        description -> Nullable<Text>,
        category -> Nullable<Text>,
        author_id -> Integer,
        is_public -> Bool,
        forked_from -> Nullable<Integer>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    nodes (id) {
        id -> Integer,
        roadmap_id -> Integer,
        title -> Text,
        description -> Nullable<Text>,
        node_type -> Text,
        position_x -> Double,
        position_y -> Double,
        status -> Text,
        color -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    connections (id) {
        id -> Integer,
        roadmap_id -> Integer,
        from_node_id -> Integer,
        to_node_id -> Integer,
        connection_type -> Text,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    resources (id) {
        id -> Integer,
        node_id -> Integer,
        resource_type -> Text,
        title -> Text,
        url -> Text,
        description -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    progress (id) {
        id -> Integer,
        user_id -> Integer,
        node_id -> Integer,
        status -> Text,
        notes -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    reviews (id) {
        id -> Integer,
        roadmap_id -> Integer,
        user_id -> Integer,
        rating -> Integer,
        comment -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

// ============================================================================
// Explore Facets
// ============================================================================

diesel::table! {
    categories (id) {
        id -> Integer,
        name -> Text,
    }
}

diesel::table! {
    tags (id) {
        id -> Integer,
        name -> Text,
    }
}

diesel::table! {
    roadmap_categories (roadmap_id, category_id) {
        roadmap_id -> Integer,
        category_id -> Integer,
    }
}

diesel::table! {
    roadmap_tags (roadmap_id, tag_id) {
        roadmap_id -> Integer,
        tag_id -> Integer,
    }
}

// ============================================================================
// Visit Counter - append-only, aggregated by the explore feed
// ============================================================================

diesel::table! {
    roadmap_views (id) {
        id -> Integer,
        roadmap_id -> Integer,
        viewed_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    users,
    roadmaps,
    nodes,
    connections,
    resources,
    progress,
    reviews,
    categories,
    tags,
    roadmap_categories,
    roadmap_tags,
    roadmap_views,
);
