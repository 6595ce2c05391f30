//! Vision API Product Search snippets.
//!
//! API base: `https://vision.googleapis.com/v1`. Product sets, products and
//! reference images live under `projects/{p}/locations/{l}`; similar-product
//! search goes through `images:annotate` with `productSearchParams`.

use crate::client::{Empty, GcpClient};
use crate::error::{Context, GcpError, GcpResult};
use crate::operation::{Operation, Status};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

const SERVICE: &str = "vision";
const V1: &str = "/v1";

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSet {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_time: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `homegoods-v2`, `apparel-v2`, `toys-v2`, `packagedgoods-v1` or `general-v1`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub product_category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub product_labels: Vec<KeyValue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Vertex {
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoundingPoly {
    #[serde(default)]
    pub vertices: Vec<Vertex>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceImage {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// `gs://bucket/object` of the image.
    #[serde(default)]
    pub uri: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bounding_polys: Vec<BoundingPoly>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportProductSetsResponse {
    #[serde(default)]
    pub reference_images: Vec<ReferenceImage>,
    #[serde(default)]
    pub statuses: Vec<Status>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub product: Product,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSearchResults {
    #[serde(default)]
    pub index_time: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    #[serde(default)]
    product_search_results: Option<ProductSearchResults>,
    #[serde(default)]
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct BatchAnnotateImagesResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductSetList {
    #[serde(default)]
    product_sets: Vec<ProductSet>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductList {
    #[serde(default)]
    products: Vec<Product>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReferenceImageList {
    #[serde(default)]
    reference_images: Vec<ReferenceImage>,
    #[serde(default)]
    next_page_token: Option<String>,
}

// ── Names ───────────────────────────────────────────────────────────────

fn location_path(project: &str, location: &str) -> String {
    format!("projects/{}/locations/{}", project, location)
}

fn product_set_name(project: &str, location: &str, product_set_id: &str) -> String {
    format!("{}/productSets/{}", location_path(project, location), product_set_id)
}

fn product_name(project: &str, location: &str, product_id: &str) -> String {
    format!("{}/products/{}", location_path(project, location), product_id)
}

fn reference_image_name(
    project: &str,
    location: &str,
    product_id: &str,
    reference_image_id: &str,
) -> String {
    format!(
        "{}/referenceImages/{}",
        product_name(project, location, product_id),
        reference_image_id
    )
}

fn print_product_set(w: &mut impl Write, s: &ProductSet) -> std::io::Result<()> {
    writeln!(w, "Product set name: {}", s.name)?;
    writeln!(w, "Product set display name: {}", s.display_name)?;
    writeln!(w, "Product set index time: {}", s.index_time.as_deref().unwrap_or(""))
}

fn print_product(w: &mut impl Write, p: &Product) -> std::io::Result<()> {
    writeln!(w, "Product name: {}", p.name)?;
    writeln!(w, "Product display name: {}", p.display_name)?;
    writeln!(w, "Product category: {}", p.product_category)?;
    let labels: Vec<String> = p
        .product_labels
        .iter()
        .map(|kv| format!("{}={}", kv.key, kv.value))
        .collect();
    writeln!(w, "Product labels: {}", labels.join(", "))
}

fn print_reference_image(w: &mut impl Write, r: &ReferenceImage) -> std::io::Result<()> {
    writeln!(w, "Reference image name: {}", r.name)?;
    writeln!(w, "Reference image uri: {}", r.uri)?;
    writeln!(w, "Reference image bounding polygons: {}", r.bounding_polys.len())
}

// ── Product sets ────────────────────────────────────────────────────────

pub async fn create_product_set(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_set_id: &str,
    display_name: &str,
) -> GcpResult<ProductSet> {
    let path = format!("{}/{}/productSets", V1, location_path(project, location));
    let body = ProductSet {
        display_name: display_name.to_string(),
        ..Default::default()
    };
    let created: ProductSet = client
        .post_with_query(SERVICE, &path, &[("productSetId", product_set_id)], &body)
        .await
        .context("CreateProductSet")?;
    writeln!(w, "Product set name: {}", created.name)?;
    Ok(created)
}

pub async fn get_product_set(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_set_id: &str,
) -> GcpResult<ProductSet> {
    let path = format!("{}/{}", V1, product_set_name(project, location, product_set_id));
    let set: ProductSet = client
        .get(SERVICE, &path, &[])
        .await
        .context("GetProductSet")?;
    print_product_set(w, &set)?;
    Ok(set)
}

pub async fn list_product_sets(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
) -> GcpResult<Vec<ProductSet>> {
    let path = format!("{}/{}/productSets", V1, location_path(project, location));
    let sets = client
        .get_all_pages(SERVICE, &path, &[], |p: ProductSetList| {
            (p.product_sets, p.next_page_token)
        })
        .await
        .context("ListProductSets")?;
    for s in &sets {
        print_product_set(w, s)?;
    }
    Ok(sets)
}

pub async fn delete_product_set(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_set_id: &str,
) -> GcpResult<()> {
    let path = format!("{}/{}", V1, product_set_name(project, location, product_set_id));
    let _: Empty = client
        .delete(SERVICE, &path, &[])
        .await
        .context("DeleteProductSet")?;
    writeln!(w, "Deleted product set.")?;
    Ok(())
}

// ── Products ────────────────────────────────────────────────────────────

pub async fn create_product(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_id: &str,
    display_name: &str,
    product_category: &str,
) -> GcpResult<Product> {
    let path = format!("{}/{}/products", V1, location_path(project, location));
    let body = Product {
        display_name: display_name.to_string(),
        product_category: product_category.to_string(),
        ..Default::default()
    };
    let created: Product = client
        .post_with_query(SERVICE, &path, &[("productId", product_id)], &body)
        .await
        .context("CreateProduct")?;
    writeln!(w, "Product name: {}", created.name)?;
    Ok(created)
}

pub async fn get_product(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_id: &str,
) -> GcpResult<Product> {
    let path = format!("{}/{}", V1, product_name(project, location, product_id));
    let product: Product = client
        .get(SERVICE, &path, &[])
        .await
        .context("GetProduct")?;
    print_product(w, &product)?;
    Ok(product)
}

pub async fn list_products(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
) -> GcpResult<Vec<Product>> {
    let path = format!("{}/{}/products", V1, location_path(project, location));
    let products = client
        .get_all_pages(SERVICE, &path, &[], |p: ProductList| (p.products, p.next_page_token))
        .await
        .context("ListProducts")?;
    for p in &products {
        print_product(w, p)?;
    }
    Ok(products)
}

/// Replace the product's labels with `key=value`.
pub async fn update_product_labels(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_id: &str,
    key: &str,
    value: &str,
) -> GcpResult<Product> {
    let name = product_name(project, location, product_id);
    let body = Product {
        name: name.clone(),
        product_labels: vec![KeyValue {
            key: key.to_string(),
            value: value.to_string(),
        }],
        ..Default::default()
    };
    let updated: Product = client
        .patch(
            SERVICE,
            &format!("{}/{}", V1, name),
            &body,
            &[("updateMask", "productLabels")],
        )
        .await
        .context("UpdateProduct")?;
    writeln!(w, "Product name: {}", updated.name)?;
    let labels: Vec<String> = updated
        .product_labels
        .iter()
        .map(|kv| format!("{}={}", kv.key, kv.value))
        .collect();
    writeln!(w, "Updated product labels: {}", labels.join(", "))?;
    Ok(updated)
}

pub async fn delete_product(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_id: &str,
) -> GcpResult<()> {
    let path = format!("{}/{}", V1, product_name(project, location, product_id));
    let _: Empty = client
        .delete(SERVICE, &path, &[])
        .await
        .context("DeleteProduct")?;
    writeln!(w, "Deleted product.")?;
    Ok(())
}

pub async fn add_product_to_product_set(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_id: &str,
    product_set_id: &str,
) -> GcpResult<()> {
    let path = format!(
        "{}/{}:addProduct",
        V1,
        product_set_name(project, location, product_set_id)
    );
    let body = serde_json::json!({ "product": product_name(project, location, product_id) });
    let _: Empty = client
        .post(SERVICE, &path, &body)
        .await
        .context("AddProductToProductSet")?;
    writeln!(w, "Added product to product set.")?;
    Ok(())
}

pub async fn remove_product_from_product_set(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_id: &str,
    product_set_id: &str,
) -> GcpResult<()> {
    let path = format!(
        "{}/{}:removeProduct",
        V1,
        product_set_name(project, location, product_set_id)
    );
    let body = serde_json::json!({ "product": product_name(project, location, product_id) });
    let _: Empty = client
        .post(SERVICE, &path, &body)
        .await
        .context("RemoveProductFromProductSet")?;
    writeln!(w, "Removed product from product set.")?;
    Ok(())
}

pub async fn list_products_in_product_set(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_set_id: &str,
) -> GcpResult<Vec<Product>> {
    let path = format!(
        "{}/{}/products",
        V1,
        product_set_name(project, location, product_set_id)
    );
    let products = client
        .get_all_pages(SERVICE, &path, &[], |p: ProductList| (p.products, p.next_page_token))
        .await
        .context("ListProductsInProductSet")?;
    for p in &products {
        print_product(w, p)?;
    }
    Ok(products)
}

// ── Reference images ────────────────────────────────────────────────────

pub async fn create_reference_image(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_id: &str,
    reference_image_id: &str,
    gcs_uri: &str,
) -> GcpResult<ReferenceImage> {
    let path = format!(
        "{}/{}/referenceImages",
        V1,
        product_name(project, location, product_id)
    );
    let body = ReferenceImage {
        uri: gcs_uri.to_string(),
        ..Default::default()
    };
    let created: ReferenceImage = client
        .post_with_query(SERVICE, &path, &[("referenceImageId", reference_image_id)], &body)
        .await
        .context("CreateReferenceImage")?;
    writeln!(w, "Reference image name: {}", created.name)?;
    writeln!(w, "Reference image uri: {}", created.uri)?;
    Ok(created)
}

pub async fn get_reference_image(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_id: &str,
    reference_image_id: &str,
) -> GcpResult<ReferenceImage> {
    let name = reference_image_name(project, location, product_id, reference_image_id);
    let image: ReferenceImage = client
        .get(SERVICE, &format!("{}/{}", V1, name), &[])
        .await
        .context("GetReferenceImage")?;
    print_reference_image(w, &image)?;
    Ok(image)
}

pub async fn list_reference_images(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_id: &str,
) -> GcpResult<Vec<ReferenceImage>> {
    let path = format!(
        "{}/{}/referenceImages",
        V1,
        product_name(project, location, product_id)
    );
    let images = client
        .get_all_pages(SERVICE, &path, &[], |p: ReferenceImageList| {
            (p.reference_images, p.next_page_token)
        })
        .await
        .context("ListReferenceImages")?;
    for r in &images {
        print_reference_image(w, r)?;
    }
    Ok(images)
}

pub async fn delete_reference_image(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_id: &str,
    reference_image_id: &str,
) -> GcpResult<()> {
    let name = reference_image_name(project, location, product_id, reference_image_id);
    let _: Empty = client
        .delete(SERVICE, &format!("{}/{}", V1, name), &[])
        .await
        .context("DeleteReferenceImage")?;
    writeln!(w, "Deleted reference image.")?;
    Ok(())
}

// ── Bulk ────────────────────────────────────────────────────────────────

/// Import product sets, products and reference images from a CSV in GCS.
pub async fn import_product_sets(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    gcs_uri: &str,
) -> GcpResult<ImportProductSetsResponse> {
    let path = format!("{}/{}/productSets:import", V1, location_path(project, location));
    let body = serde_json::json!({ "inputConfig": { "gcsSource": { "csvFileUri": gcs_uri } } });
    let op: Operation = client
        .post(SERVICE, &path, &body)
        .await
        .context("ImportProductSets")?;
    writeln!(w, "Processing operation name: {}", op.name)?;

    let resp: ImportProductSetsResponse = client
        .wait_operation(SERVICE, V1, op)
        .await
        .context("Wait")?
        .into_response(SERVICE)?;
    writeln!(w, "Processing done.")?;

    // `statuses` lines up with the CSV rows; code 0 means the row imported.
    for (i, status) in resp.statuses.iter().enumerate() {
        writeln!(w, "Status of processing line {} of the csv: {}", i, status.code)?;
        if status.code == 0 {
            if let Some(image) = resp.reference_images.get(i) {
                writeln!(w, "Reference image name: {}", image.name)?;
            }
        } else {
            writeln!(w, "Status code not OK: {}", status.message)?;
        }
    }
    Ok(resp)
}

async fn purge(client: &GcpClient, project: &str, location: &str, body: &serde_json::Value) -> GcpResult<()> {
    let path = format!("{}/{}/products:purge", V1, location_path(project, location));
    let op: Operation = client
        .post(SERVICE, &path, body)
        .await
        .context("PurgeProducts")?;
    client.wait_operation(SERVICE, V1, op).await.context("Wait")?;
    Ok(())
}

/// Delete every product that belongs to no product set.
pub async fn purge_orphan_products(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
) -> GcpResult<()> {
    let body = serde_json::json!({ "deleteOrphanProducts": true, "force": true });
    purge(client, project, location, &body).await?;
    writeln!(w, "Orphan products deleted.")?;
    Ok(())
}

/// Delete every product in a product set, and the products themselves.
pub async fn purge_products_in_product_set(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_set_id: &str,
) -> GcpResult<()> {
    let body = serde_json::json!({
        "productSetPurgeConfig": { "productSetId": product_set_id },
        "force": true
    });
    purge(client, project, location, &body).await?;
    writeln!(w, "Products removed from product set.")?;
    Ok(())
}

// ── Search ──────────────────────────────────────────────────────────────

async fn search_similar(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_set_id: &str,
    product_category: &str,
    image: serde_json::Value,
    filter: &str,
) -> GcpResult<ProductSearchResults> {
    let mut params = serde_json::json!({
        "productSet": product_set_name(project, location, product_set_id),
        "productCategories": [product_category]
    });
    if !filter.is_empty() {
        params["filter"] = serde_json::Value::from(filter);
    }
    let body = serde_json::json!({
        "requests": [{
            "image": image,
            "features": [{ "type": "PRODUCT_SEARCH" }],
            "imageContext": { "productSearchParams": params }
        }]
    });
    let path = format!("{}/images:annotate", V1);
    let resp: BatchAnnotateImagesResponse = client
        .post(SERVICE, &path, &body)
        .await
        .context("AnnotateImage")?;

    let first = resp
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| GcpError::from_str(SERVICE, "empty annotate response"))
        .context("AnnotateImage")?;
    if let Some(st) = first.error {
        return Err(GcpError::from_operation_status(SERVICE, st.code, &st.message)
            .with_method("AnnotateImage"));
    }
    let results = first.product_search_results.unwrap_or_default();

    writeln!(
        w,
        "Product set index time: {}",
        results.index_time.as_deref().unwrap_or("")
    )?;
    for r in &results.results {
        writeln!(w, "Product: {}", r.product.name)?;
        writeln!(w, "Display name: {}", r.product.display_name)?;
        writeln!(w, "Score(Confidence): {}", r.score)?;
        writeln!(w, "Image name: {}", r.image)?;
    }
    Ok(results)
}

/// Search a product set for products similar to a local image.
///
/// `filter` is a label expression such as `style=womens`; empty for none.
pub async fn get_similar_products_file(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_set_id: &str,
    product_category: &str,
    file: &Path,
    filter: &str,
) -> GcpResult<ProductSearchResults> {
    let bytes = tokio::fs::read(file).await?;
    let image = serde_json::json!({ "content": STANDARD.encode(&bytes) });
    search_similar(w, client, project, location, product_set_id, product_category, image, filter)
        .await
}

/// Search a product set for products similar to an image in GCS.
pub async fn get_similar_products_uri(
    w: &mut impl Write,
    client: &GcpClient,
    project: &str,
    location: &str,
    product_set_id: &str,
    product_category: &str,
    image_uri: &str,
    filter: &str,
) -> GcpResult<ProductSearchResults> {
    let image = serde_json::json!({ "source": { "imageUri": image_uri } });
    search_similar(w, client, project, location, product_set_id, product_category, image, filter)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_names() {
        assert_eq!(
            reference_image_name("p", "us-west1", "prod", "img"),
            "projects/p/locations/us-west1/products/prod/referenceImages/img"
        );
        assert_eq!(
            product_set_name("p", "us-west1", "set"),
            "projects/p/locations/us-west1/productSets/set"
        );
    }

    #[test]
    fn product_create_body_skips_empty_fields() {
        let p = Product {
            display_name: "fake_product_display_name_for_testing".into(),
            product_category: "apparel-v2".into(),
            ..Default::default()
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "displayName": "fake_product_display_name_for_testing",
                "productCategory": "apparel-v2"
            })
        );
    }
}
