//! Bundled articles shown when the news list has neither cache nor network.

use crate::models::{NewsItem, NewsPage, NewsQuery, Pagination};

struct MockArticle {
    id: i64,
    title: &'static str,
    excerpt: &'static str,
    category: &'static str,
    featured: bool,
    published_at: &'static str,
}

const MOCK_ARTICLES: [MockArticle; 6] = [
    MockArticle {
        id: 1,
        title: "Penerimaan Peserta Didik Baru Tahun Ajaran 2024/2025",
        excerpt: "Pendaftaran peserta didik baru dibuka secara daring mulai bulan Juni.",
        category: "Pengumuman",
        featured: true,
        published_at: "2024-05-20",
    },
    MockArticle {
        id: 2,
        title: "Siswa Raih Juara 1 Olimpiade Sains Tingkat Provinsi",
        excerpt: "Tim olimpiade sekolah membawa pulang medali emas bidang fisika.",
        category: "Prestasi",
        featured: true,
        published_at: "2024-05-12",
    },
    MockArticle {
        id: 3,
        title: "Kegiatan Bakti Sosial OSIS di Desa Binaan",
        excerpt: "OSIS menyalurkan bantuan sembako dan kegiatan belajar bersama.",
        category: "Kegiatan",
        featured: false,
        published_at: "2024-04-28",
    },
    MockArticle {
        id: 4,
        title: "Jadwal Ujian Akhir Semester Genap",
        excerpt: "Ujian akhir semester genap dilaksanakan selama dua pekan.",
        category: "Akademik",
        featured: false,
        published_at: "2024-04-15",
    },
    MockArticle {
        id: 5,
        title: "Workshop Kewirausahaan Bersama Alumni",
        excerpt: "Alumni berbagi pengalaman merintis usaha kepada siswa kelas XII.",
        category: "Kegiatan",
        featured: false,
        published_at: "2024-03-30",
    },
    MockArticle {
        id: 6,
        title: "Tim Basket Putri Melaju ke Final Kejuaraan Daerah",
        excerpt: "Tim basket putri mengalahkan juara bertahan di babak semifinal.",
        category: "Prestasi",
        featured: false,
        published_at: "2024-03-18",
    },
];

impl MockArticle {
    fn to_item(&self) -> NewsItem {
        NewsItem {
            id: self.id,
            title: self.title.to_string(),
            content: self.excerpt.to_string(),
            excerpt: Some(self.excerpt.to_string()),
            image_url: None,
            category: Some(self.category.to_string()),
            author: Some("Admin".to_string()),
            is_featured: self.featured,
            views: 0,
            published_at: Some(self.published_at.to_string()),
        }
    }

    fn matches(&self, query: &NewsQuery) -> bool {
        if query.featured && !self.featured {
            return false;
        }
        if let Some(ref category) = query.category {
            if !self.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        let search = query.search.trim().to_lowercase();
        search.is_empty()
            || self.title.to_lowercase().contains(&search)
            || self.excerpt.to_lowercase().contains(&search)
    }
}

/// The page of bundled articles `query` would have returned.
pub(super) fn fallback_page(query: &NewsQuery) -> NewsPage {
    let matching: Vec<&MockArticle> = MOCK_ARTICLES.iter().filter(|a| a.matches(query)).collect();
    let limit = query.limit.max(1) as usize;
    let page = query.page.max(1);
    let total = matching.len();
    let pages = total.div_ceil(limit).max(1) as u32;

    let items = matching
        .into_iter()
        .skip((page as usize - 1) * limit)
        .take(limit)
        .map(MockArticle::to_item)
        .collect();

    NewsPage {
        items,
        pagination: Pagination {
            page,
            pages,
            total: total as u64,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginates_by_limit() {
        let mut query = NewsQuery::page(1);
        query.limit = 4;
        let first = fallback_page(&query);
        assert_eq!(first.items.len(), 4);
        assert_eq!(first.pagination, Pagination { page: 1, pages: 2, total: 6 });

        query.page = 2;
        let second = fallback_page(&query);
        assert_eq!(second.items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![5, 6]);
    }

    #[test]
    fn test_filters_search_and_featured() {
        let mut query = NewsQuery::page(1);
        query.search = "OLIMPIADE".into();
        let page = fallback_page(&query);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].id, 2);

        let mut query = NewsQuery::page(1);
        query.featured = true;
        assert_eq!(fallback_page(&query).pagination.total, 2);

        let query = NewsQuery::for_category("Prestasi");
        assert_eq!(fallback_page(&query).pagination.total, 2);
    }

    #[test]
    fn test_no_match_is_one_empty_page() {
        let mut query = NewsQuery::page(3);
        query.search = "tidak ada".into();
        let page = fallback_page(&query);
        assert!(page.items.is_empty());
        assert_eq!(page.pagination.pages, 1);
    }
}
