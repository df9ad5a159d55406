mod common;

use axum::http::StatusCode;
use bookshelf_kernel::settings::DeniedDelete;
use common::{body_json, location, png, spawn, spawn_with, MultipartBody};

#[tokio::test]
async fn fbv_create_stores_the_book_as_fbv() {
    let app = spawn().await;
    let cookie = app.register("reader").await;

    let body = MultipartBody::new()
        .text("title", "Dune")
        .text("author", "Herbert")
        .file("image", "dune cover.png", "image/png", &png());
    let response = app.post_multipart("/books/create-fbv/", body, Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/hello-fbv/");

    let books = app.books().await;
    assert_eq!(books.len(), 1);
    let (_, title, author, image, source_type) = &books[0];
    assert_eq!(title, "Dune");
    assert_eq!(author, "Herbert");
    assert_eq!(*source_type, 1);
    assert_eq!(image, "books/dune_cover.png");
    assert!(app.dir.path().join("media").join(image).is_file());
}

#[tokio::test]
async fn family_paths_force_their_source_type() {
    let app = spawn().await;
    let cookie = app.register("reader").await;

    let response = app
        .create_book("/books/create-fbv/", "Dune", Some("2"), &cookie)
        .await;
    assert_eq!(location(&response), "/hello-fbv/");

    let response = app
        .create_book("/books/create-cbv/", "Emma", Some("1"), &cookie)
        .await;
    assert_eq!(location(&response), "/hello-cbv/");

    let stored: Vec<(String, i64)> = app
        .books()
        .await
        .into_iter()
        .map(|(_, title, _, _, source)| (title, source))
        .collect();
    assert_eq!(
        stored,
        vec![("Dune".to_string(), 1), ("Emma".to_string(), 2)]
    );
}

#[tokio::test]
async fn lists_never_mix_families() {
    let app = spawn().await;
    let cookie = app.register("reader").await;
    for title in ["Dune", "Solaris"] {
        app.create_book("/books/create-fbv/", title, None, &cookie).await;
    }
    app.create_book("/books/create-cbv/", "Emma", None, &cookie).await;

    let page = body_json(app.get("/hello-fbv/", Some(&cookie)).await).await;
    assert_eq!(page["view"], "book_list");
    let titles: Vec<&str> = page["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|book| book["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["Dune", "Solaris"]);
    assert!(page["books"]
        .as_array()
        .unwrap()
        .iter()
        .all(|book| book["source_type"] == 1));

    let page = body_json(app.get("/hello-cbv/", Some(&cookie)).await).await;
    let books = page["books"].as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert_eq!(books[0]["title"], "Emma");
    assert_eq!(books[0]["source_type"], 2);
    assert_eq!(books[0]["edit_url"], format!("/books/{}/edit-cbv/", books[0]["id"]));
}

#[tokio::test]
async fn invalid_create_rerenders_with_errors() {
    let app = spawn().await;
    let cookie = app.register("reader").await;

    let body = MultipartBody::new()
        .text("title", "   ")
        .text("author", "Herbert")
        .file("image", "notes.png", "image/png", b"plain text, not a picture");
    let response = app.post_multipart("/books/create-cbv/", body, Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["view"], "book_form");
    assert_eq!(page["type"], "CBV Create");

    let fields = page["form"]["fields"].as_array().unwrap();
    let field = |name: &str| fields.iter().find(|f| f["name"] == name).unwrap().clone();
    assert_eq!(field("title")["errors"][0], "This field is required.");
    assert_eq!(
        field("image")["errors"][0],
        "Upload a valid image. The file you uploaded was either not an image or a corrupted image."
    );
    assert_eq!(field("author")["value"], "Herbert");
    assert_eq!(app.book_count().await, 0);
}

#[tokio::test]
async fn create_page_shows_an_empty_form() {
    let app = spawn().await;
    let cookie = app.register("reader").await;

    let page = body_json(app.get("/books/create-fbv/", Some(&cookie)).await).await;
    assert_eq!(page["view"], "book_form");
    assert_eq!(page["type"], "FBV Create");
    assert_eq!(page["form"]["is_bound"], false);
    let names: Vec<&str> = page["form"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["title", "author", "image"]);
}

#[tokio::test]
async fn selector_uses_the_submitted_source_type() {
    let app = spawn().await;
    let cookie = app.register("reader").await;

    let response = app.create_book("/book-form/", "Emma", Some("2"), &cookie).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/hello-cbv/");

    let response = app.create_book("/book-form/", "Dune", None, &cookie).await;
    assert_eq!(location(&response), "/hello-fbv/");

    let response = app.create_book("/book-form/", "Nope", Some("7"), &cookie).await;
    assert_eq!(response.status(), StatusCode::OK);
    let page = body_json(response).await;
    assert_eq!(page["type"], "Book Form");
    let fields = page["form"]["fields"].as_array().unwrap();
    let source = fields.iter().find(|f| f["name"] == "source_type").unwrap();
    assert_eq!(
        source["errors"][0],
        "Select a valid choice. 7 is not one of the available choices."
    );

    let stored: Vec<i64> = app.books().await.into_iter().map(|row| row.4).collect();
    assert_eq!(stored, [2, 1]);
}

#[tokio::test]
async fn update_keeps_source_type_and_image() {
    let app = spawn().await;
    let cookie = app.register("reader").await;
    app.create_book("/books/create-cbv/", "Emma", None, &cookie).await;
    let (id, _, _, image, _) = app.books().await.remove(0);

    let page = body_json(app.get(&format!("/books/{id}/edit-cbv/"), Some(&cookie)).await).await;
    assert_eq!(page["type"], "CBV Update");
    assert_eq!(page["object"]["title"], "Emma");

    // edited through the other family's path on purpose
    let body = MultipartBody::new()
        .text("title", "Emma (annotated)")
        .text("author", "Austen")
        .text("source_type", "1");
    let response = app
        .post_multipart(&format!("/books/{id}/edit-fbv/"), body, Some(&cookie))
        .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/hello-cbv/");
    let (_, title, author, stored_image, source_type) = app.books().await.remove(0);
    assert_eq!(title, "Emma (annotated)");
    assert_eq!(author, "Austen");
    assert_eq!(stored_image, image);
    assert_eq!(source_type, 2);
}

#[tokio::test]
async fn missing_books_are_not_found() {
    let app = spawn().await;
    let cookie = app.register("reader").await;

    let response = app.get("/books/404/edit-fbv/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "not_found");

    let response = app.get("/books/404/delete-cbv/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_ids_are_not_found() {
    let app = spawn().await;
    let cookie = app.register("reader").await;

    for uri in ["/books/abc/edit-fbv/", "/books/1x/delete-cbv/"] {
        let response = app.get(uri, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body_json(response).await["error"]["code"], "not_found");
    }

    let response = app
        .post_form("/books/abc/delete-fbv/", &[], Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_update_discards_the_new_upload() {
    let app = spawn().await;
    let cookie = app.register("reader").await;
    app.create_book("/books/create-fbv/", "Dune", None, &cookie).await;
    let (id, _, _, image, _) = app.books().await.remove(0);

    // the row vanishes between loading and writing
    sqlx::query("CREATE TRIGGER book_frozen BEFORE UPDATE ON book BEGIN SELECT RAISE(IGNORE); END")
        .execute(&app.state.pool)
        .await
        .unwrap();

    let body = MultipartBody::new()
        .text("title", "Dune Messiah")
        .text("author", "Herbert")
        .file("image", "messiah.png", "image/png", &png());
    let response = app
        .post_multipart(&format!("/books/{id}/edit-fbv/"), body, Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let stored: Vec<String> = std::fs::read_dir(app.dir.path().join("media").join("books"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(stored, ["cover.png"]);
    assert_eq!(app.books().await[0].3, image);
}

#[tokio::test]
async fn openapi_document_describes_every_page() {
    let app = spawn().await;
    let doc = body_json(app.get("/docs/openapi.json", None).await).await;

    assert!(doc["paths"]["/accounts/logout/"]["get"].is_object());
    assert!(doc["paths"]["/logout/"]["post"].is_object());
    for slug in ["fbv", "cbv"] {
        let delete = &doc["paths"][format!("/books/{{id}}/delete-{slug}/")];
        assert_eq!(
            delete["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/BookConfirmDelete"
        );
        assert!(delete["post"]["responses"]["303"].is_object());
        assert!(delete["post"]["responses"]["200"].is_null());
    }
    assert!(doc["components"]["schemas"]["BookConfirmDelete"].is_object());
}

#[tokio::test]
async fn non_superuser_delete_is_redirected_and_changes_nothing() {
    let app = spawn().await;
    let cookie = app.register("reader").await;
    app.create_book("/books/create-fbv/", "Dune", None, &cookie).await;
    let id = app.books().await[0].0;

    let page = body_json(app.get(&format!("/books/{id}/delete-fbv/"), Some(&cookie)).await).await;
    assert_eq!(page["view"], "book_confirm_delete");
    assert_eq!(page["type"], "FBV");
    assert_eq!(page["can_delete"], false);

    let response = app
        .post_form(&format!("/books/{id}/delete-fbv/"), &[], Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/dashboard/");
    assert_eq!(app.book_count().await, 1);
}

#[tokio::test]
async fn denied_delete_can_answer_forbidden() {
    let app = spawn_with(|settings| settings.auth.denied_delete = DeniedDelete::Forbidden).await;
    let cookie = app.register("reader").await;
    app.create_book("/books/create-cbv/", "Emma", None, &cookie).await;
    let id = app.books().await[0].0;

    let response = app
        .post_form(&format!("/books/{id}/delete-cbv/"), &[], Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["error"]["code"], "forbidden");
    assert_eq!(app.book_count().await, 1);
}

#[tokio::test]
async fn superuser_delete_removes_exactly_one_book() {
    let app = spawn().await;
    let cookie = app.superuser("admin").await;
    app.create_book("/books/create-cbv/", "Emma", None, &cookie).await;
    app.create_book("/books/create-cbv/", "Persuasion", None, &cookie).await;
    let id = app.books().await[0].0;

    // the confirmation page alone deletes nothing
    let page = body_json(app.get(&format!("/books/{id}/delete-cbv/"), Some(&cookie)).await).await;
    assert_eq!(page["can_delete"], true);
    assert_eq!(app.book_count().await, 2);

    let response = app
        .post_form(&format!("/books/{id}/delete-cbv/"), &[], Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/hello-cbv/");
    assert_eq!(app.book_count().await, 1);

    let response = app.get(&format!("/books/{id}/edit-cbv/"), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn uploaded_images_are_served_from_media() {
    let app = spawn().await;
    let cookie = app.register("reader").await;
    app.create_book("/books/create-fbv/", "Dune", None, &cookie).await;

    let page = body_json(app.get("/hello-fbv/", Some(&cookie)).await).await;
    let url = page["books"][0]["image_url"].as_str().unwrap().to_string();
    assert_eq!(url, "/media/books/cover.png");

    let response = app.get(&url, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), png().as_slice());
}

#[tokio::test]
async fn oversized_uploads_are_rejected() {
    let app = spawn_with(|settings| settings.media.max_upload_bytes = 256).await;
    let cookie = app.register("reader").await;

    let body = MultipartBody::new()
        .text("title", "Dune")
        .text("author", "Herbert")
        .file("image", "big.png", "image/png", &vec![0u8; 4096]);
    let response = app.post_multipart("/books/create-fbv/", body, Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.book_count().await, 0);
}

#[tokio::test]
async fn dashboard_counts_each_family() {
    let app = spawn().await;
    let cookie = app.register("reader").await;
    app.create_book("/books/create-fbv/", "Dune", None, &cookie).await;
    app.create_book("/books/create-cbv/", "Emma", None, &cookie).await;
    app.create_book("/books/create-cbv/", "Persuasion", None, &cookie).await;

    let page = body_json(app.get("/dashboard/", Some(&cookie)).await).await;
    assert_eq!(page["total"], 3);
    assert_eq!(page["families"][0]["label"], "FBV");
    assert_eq!(page["families"][0]["count"], 1);
    assert_eq!(page["families"][1]["count"], 2);
    assert_eq!(page["families"][1]["list_url"], "/hello-cbv/");
}
